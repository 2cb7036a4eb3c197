//! Network provisioning
//!
//! The persisted settings document holds the broker address (and optional
//! credentials) entered during first-run configuration. On a host there is
//! no captive portal: the "portal" is the settings file itself, written by
//! `aht10-env-sensor provision` or by hand.

use crate::device::events::{LifecycleEvent, LifecycleListener};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Failed to read settings {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write settings {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed settings document {path}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Serialization error")]
    Serialize(#[from] serde_json::Error),
    #[error("No settings provided within {0:?}")]
    PortalTimeout(Duration),
}

/// Settings document persisted by provisioning
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSettings {
    #[serde(default)]
    pub mqtt_server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl PersistedSettings {
    pub fn new(mqtt_server: impl Into<String>) -> Self {
        Self {
            mqtt_server: mqtt_server.into(),
            ..Self::default()
        }
    }

    /// Whether a broker address is present
    pub fn is_configured(&self) -> bool {
        !self.mqtt_server.trim().is_empty()
    }
}

/// Provisioning subsystem as seen by the connectivity manager
#[async_trait]
pub trait Provisioning: Send {
    /// Currently persisted settings
    fn settings(&self) -> &PersistedSettings;

    /// Discard the persisted settings and wait for the user to supply new
    /// ones. Raises [`LifecycleEvent::ConfigPortalEntered`] on entry and
    /// [`LifecycleEvent::ConfigSaved`] when settings arrive.
    async fn reset_and_reprompt(
        &mut self,
        listener: &mut dyn LifecycleListener,
    ) -> Result<(), ProvisioningError>;
}

/// Load a settings document. A missing file yields empty settings.
pub fn load_settings(path: &Path) -> Result<PersistedSettings, ProvisioningError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PersistedSettings::default()),
        Err(source) => {
            return Err(ProvisioningError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&content).map_err(|source| ProvisioningError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a settings document
pub fn save_settings(path: &Path, settings: &PersistedSettings) -> Result<(), ProvisioningError> {
    let document = serde_json::to_string_pretty(settings)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ProvisioningError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, document).map_err(|source| ProvisioningError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// File-backed provisioning
#[derive(Debug)]
pub struct FilePortal {
    path: PathBuf,
    portal_name: String,
    settings: PersistedSettings,
    timeout: Duration,
    poll_interval: Duration,
}

impl FilePortal {
    /// Open the portal, loading settings from `path` if present
    pub fn open(
        path: impl Into<PathBuf>,
        portal_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProvisioningError> {
        let path = path.into();
        let settings = load_settings(&path)?;
        debug!(path = %path.display(), configured = settings.is_configured(), "Loaded provisioning settings");
        Ok(Self {
            path,
            portal_name: portal_name.into(),
            settings,
            timeout,
            poll_interval: Duration::from_secs(1),
        })
    }

    /// How often the portal checks for new settings while waiting
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist new settings and announce the save
    pub fn save(
        &mut self,
        settings: PersistedSettings,
        listener: &mut dyn LifecycleListener,
    ) -> Result<(), ProvisioningError> {
        listener.notify(LifecycleEvent::ConfigSaved);
        save_settings(&self.path, &settings)?;
        info!(path = %self.path.display(), mqtt_server = %settings.mqtt_server, "Provisioning settings saved");
        self.settings = settings;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ProvisioningError> {
        self.settings = PersistedSettings::default();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ProvisioningError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[async_trait]
impl Provisioning for FilePortal {
    fn settings(&self) -> &PersistedSettings {
        &self.settings
    }

    async fn reset_and_reprompt(
        &mut self,
        listener: &mut dyn LifecycleListener,
    ) -> Result<(), ProvisioningError> {
        self.clear()?;
        warn!(path = %self.path.display(), "Provisioning reset, waiting for new settings");
        listener.notify(LifecycleEvent::ConfigPortalEntered {
            portal: self.portal_name.clone(),
        });

        let deadline = Instant::now() + self.timeout;
        loop {
            match load_settings(&self.path) {
                Ok(settings) if settings.is_configured() => {
                    listener.notify(LifecycleEvent::ConfigSaved);
                    info!(mqtt_server = %settings.mqtt_server, "Provisioning settings received");
                    self.settings = settings;
                    return Ok(());
                }
                Ok(_) => {}
                // A half-written file is retried on the next poll
                Err(e) => debug!("Settings not readable yet: {}", e),
            }

            if Instant::now() >= deadline {
                return Err(ProvisioningError::PortalTimeout(self.timeout));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::events::EventLog;
    use tempfile::TempDir;

    #[test]
    fn test_settings_document_shape() {
        let settings = PersistedSettings::new("broker.local");
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"mqtt_server":"broker.local"}"#);

        let parsed: PersistedSettings =
            serde_json::from_str(r#"{"mqtt_server":"b","username":"u"}"#).unwrap();
        assert_eq!(parsed.username.as_deref(), Some("u"));
        assert_eq!(parsed.password, None);
    }

    #[test]
    fn test_missing_file_is_unconfigured() {
        let dir = TempDir::new().unwrap();
        let portal =
            FilePortal::open(dir.path().join("config.json"), "AHT10-1", Duration::ZERO).unwrap();
        assert!(!portal.settings().is_configured());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            FilePortal::open(&path, "AHT10-1", Duration::ZERO),
            Err(ProvisioningError::Malformed { .. })
        ));
    }

    #[test]
    fn test_save_persists_and_notifies() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut portal = FilePortal::open(&path, "AHT10-1", Duration::ZERO).unwrap();
        let mut events = EventLog::default();

        portal
            .save(PersistedSettings::new("10.0.0.2"), &mut events)
            .unwrap();

        assert_eq!(events.events, vec![LifecycleEvent::ConfigSaved]);
        assert_eq!(portal.settings().mqtt_server, "10.0.0.2");
        assert_eq!(load_settings(&path).unwrap().mqtt_server, "10.0.0.2");
    }

    #[tokio::test]
    async fn test_reprompt_times_out_without_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        save_settings(&path, &PersistedSettings::new("old")).unwrap();
        let mut portal = FilePortal::open(&path, "AHT10-1", Duration::from_millis(30))
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));
        let mut events = EventLog::default();

        let result = portal.reset_and_reprompt(&mut events).await;

        assert!(matches!(result, Err(ProvisioningError::PortalTimeout(_))));
        assert!(!path.exists());
        assert!(!portal.settings().is_configured());
        assert_eq!(
            events.events,
            vec![LifecycleEvent::ConfigPortalEntered {
                portal: "AHT10-1".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_reprompt_picks_up_new_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut portal = FilePortal::open(&path, "AHT10-1", Duration::from_secs(5))
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            save_settings(&writer_path, &PersistedSettings::new("broker.local")).unwrap();
        });

        let mut events = EventLog::default();
        portal.reset_and_reprompt(&mut events).await.unwrap();
        writer.await.unwrap();

        assert_eq!(portal.settings().mqtt_server, "broker.local");
        assert_eq!(events.events.last(), Some(&LifecycleEvent::ConfigSaved));
    }
}
