//! Named lifecycle events raised by collaborators
//!
//! The update transport and the provisioning subsystem report progress
//! through [`LifecycleListener`] instead of ad-hoc callbacks.

use crate::debug::DebugStream;
use crate::debugln;
use std::fmt;

/// Failure classes reported by the firmware-update transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    Auth,
    Begin,
    Connect,
    Receive,
    End,
}

impl UpdateError {
    /// Numeric code used in diagnostic output
    pub fn code(self) -> u8 {
        match self {
            UpdateError::Auth => 0,
            UpdateError::Begin => 1,
            UpdateError::Connect => 2,
            UpdateError::Receive => 3,
            UpdateError::End => 4,
        }
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UpdateError::Auth => "Auth Failed",
            UpdateError::Begin => "Begin Failed",
            UpdateError::Connect => "Connect Failed",
            UpdateError::Receive => "Receive Failed",
            UpdateError::End => "End Failed",
        };
        f.write_str(text)
    }
}

/// Events the core accepts from its collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Provisioning opened its configuration portal
    ConfigPortalEntered { portal: String },
    /// Provisioning persisted new settings
    ConfigSaved,
    UpdateStarted,
    UpdateProgress { progress: u32, total: u32 },
    UpdateFinished,
    UpdateFailed(UpdateError),
}

/// Receiver of lifecycle events
pub trait LifecycleListener: Send {
    fn notify(&mut self, event: LifecycleEvent);
}

/// Percentage of an update transferred, guarding against a zero total
pub fn update_percent(progress: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let percent = u64::from(progress) * 100 / u64::from(total);
    percent.min(100) as u32
}

impl LifecycleListener for DebugStream {
    fn notify(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::ConfigPortalEntered { portal } => {
                debugln!(self, "Entered config mode");
                debugln!(self, "{}", portal);
            }
            LifecycleEvent::ConfigSaved => {
                debugln!(self, "Saving config");
            }
            LifecycleEvent::UpdateStarted => {
                debugln!(self, "OTA Start");
            }
            LifecycleEvent::UpdateProgress { progress, total } => {
                debugln!(self, "OTA Progress: {}%", update_percent(progress, total));
            }
            LifecycleEvent::UpdateFinished => {
                debugln!(self, "OTA End");
            }
            LifecycleEvent::UpdateFailed(error) => {
                tracing::warn!(code = error.code(), "Firmware update failed: {}", error);
                debugln!(self, "Error[{}]: {}", error.code(), error);
            }
        }
    }
}

/// Listener that keeps every event, for inspection
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<LifecycleEvent>,
}

impl LifecycleListener for EventLog {
    fn notify(&mut self, event: LifecycleEvent) {
        self.events.push(event);
    }
}
