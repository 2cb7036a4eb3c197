//! Firmware-update transport

use crate::device::events::LifecycleListener;
use tracing::debug;

/// Listener for remote firmware pushes. Progress and failures are reported
/// through the supplied [`LifecycleListener`].
pub trait UpdateTransport: Send {
    /// Start listening, advertising `hostname`
    fn begin(&mut self, hostname: &str, listener: &mut dyn LifecycleListener);

    /// Service pending update traffic; called once per loop tick
    fn handle(&mut self, listener: &mut dyn LifecycleListener);
}

/// Update transport for hosts where the package manager owns upgrades
#[derive(Debug, Default)]
pub struct DisabledUpdates {
    hostname: Option<String>,
}

impl DisabledUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }
}

impl UpdateTransport for DisabledUpdates {
    fn begin(&mut self, hostname: &str, _listener: &mut dyn LifecycleListener) {
        debug!(hostname, "Remote firmware updates disabled on this host");
        self.hostname = Some(hostname.to_string());
    }

    fn handle(&mut self, _listener: &mut dyn LifecycleListener) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::events::EventLog;

    #[test]
    fn test_disabled_updates_remember_hostname_and_stay_silent() {
        let mut updates = DisabledUpdates::new();
        let mut events = EventLog::default();
        assert_eq!(updates.hostname(), None);

        updates.begin("AHT10-1A2B3C", &mut events);
        updates.handle(&mut events);

        assert_eq!(updates.hostname(), Some("AHT10-1A2B3C"));
        assert!(events.events.is_empty());
    }
}
