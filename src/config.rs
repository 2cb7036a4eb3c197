//! Daemon configuration
//!
//! TOML file with one section per concern. Every field has a default, so an
//! empty file is a valid configuration. Broker credentials are never stored
//! here: the file names environment variables that are read at runtime.

use crate::device::{DeviceTiming, ReconnectPolicy, SessionOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default locations searched when no `--config` is given
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["sensor.toml", "config/sensor.toml"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub sensor: SensorSection,
    #[serde(default)]
    pub network: NetworkSection,
}

/// Identity and provisioning storage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Hardware id; derived from the machine id when absent
    pub chip_id: Option<u32>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_sw_version")]
    pub sw_version: String,
    /// Persisted provisioning document
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
    /// How long a provisioning reset waits for new settings
    #[serde(default = "default_portal_timeout")]
    pub portal_timeout_secs: u64,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            chip_id: None,
            model: default_model(),
            sw_version: default_sw_version(),
            settings_path: default_settings_path(),
            portal_timeout_secs: default_portal_timeout(),
        }
    }
}

fn default_model() -> String {
    "AHT10".to_string()
}

fn default_sw_version() -> String {
    "2022.06.14".to_string()
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("config.json")
}

fn default_portal_timeout() -> u64 {
    180 // 3 minutes
}

/// Broker session parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Port used when the provisioned address has none
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: u32,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            keep_alive_secs: default_keep_alive(),
            max_packet_size: default_max_packet_size(),
            username_env: None,
            password_env: None,
        }
    }
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    10
}

fn default_max_packet_size() -> u32 {
    2048
}

/// Loop and retry timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingSection {
    #[serde(default = "default_publish_interval")]
    pub publish_interval_ms: u32,
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            publish_interval_ms: default_publish_interval(),
            reconnect_interval_ms: default_reconnect_interval(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

fn default_publish_interval() -> u32 {
    30_000
}

fn default_reconnect_interval() -> u32 {
    60_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_delay() -> u64 {
    3_000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SensorSection {
    /// hwmon directory of the AHT10; searched under `/sys/class/hwmon` when absent
    pub hwmon_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    #[serde(default = "default_interface")]
    pub interface: String,
    /// SSID reported in the state document
    #[serde(default)]
    pub ssid: String,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            ssid: String::new(),
        }
    }
}

fn default_interface() -> String {
    "wlan0".to_string()
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to render TOML: {0}")]
    TomlRender(#[from] toml::ser::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DeviceConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DeviceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// First existing file among [`DEFAULT_CONFIG_PATHS`]
    pub fn find_default() -> Option<PathBuf> {
        DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("timing.publish_interval_ms", u64::from(self.timing.publish_interval_ms)),
            ("timing.reconnect_interval_ms", u64::from(self.timing.reconnect_interval_ms)),
            ("timing.max_attempts", u64::from(self.timing.max_attempts)),
            ("mqtt.keep_alive_secs", self.mqtt.keep_alive_secs),
            ("mqtt.max_packet_size", u64::from(self.mqtt.max_packet_size)),
            ("mqtt.port", u64::from(self.mqtt.port)),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::InvalidConfig(format!("{name} must be non-zero")));
        }
        if self.device.model.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "device.model must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Helper method to get environment variable with consistent error handling
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    /// Get MQTT username from environment variable
    pub fn get_mqtt_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get MQTT password from environment variable
    pub fn get_mqtt_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.password_env.as_ref())
    }

    /// Require the username variable when one is named
    pub fn require_mqtt_username(&self) -> Result<Option<String>, ConfigError> {
        match &self.mqtt.username_env {
            Some(name) => std::env::var(name)
                .map(Some)
                .map_err(|_| ConfigError::EnvVarNotFound(name.clone())),
            None => Ok(None),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            port: self.mqtt.port,
            keep_alive: Duration::from_secs(self.mqtt.keep_alive_secs),
            max_packet_size: self.mqtt.max_packet_size,
            username: self.get_mqtt_username(),
            password: self.get_mqtt_password(),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.timing.max_attempts,
            retry_delay: Duration::from_millis(self.timing.retry_delay_ms),
        }
    }

    pub fn device_timing(&self) -> DeviceTiming {
        DeviceTiming {
            publish_interval_ms: self.timing.publish_interval_ms,
            reconnect_interval_ms: self.timing.reconnect_interval_ms,
        }
    }

    pub fn portal_timeout(&self) -> Duration {
        Duration::from_secs(self.device.portal_timeout_secs)
    }
}
