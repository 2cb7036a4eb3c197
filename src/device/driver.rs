//! Cooperative main loop
//!
//! One owner, one thread of execution: each tick services the update
//! transport, the broker session, the sample timer and the reconnect timer,
//! in that order.

use super::lifecycle::{ConnectivityManager, ReconnectOutcome};
use super::scheduler::{SampleOutcome, SampleScheduler};
use super::timer::IntervalTimer;
use crate::debug::DebugStream;
use crate::debugln;
use crate::platform::{MonotonicClock, NetworkInfo, SensorDriver, UpdateTransport};
use crate::protocol::FIRMWARE_PREFIX;
use crate::provisioning::Provisioning;
use crate::transport::{BrokerClient, InboundMessage};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Loop intervals in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTiming {
    pub publish_interval_ms: u32,
    pub reconnect_interval_ms: u32,
}

impl Default for DeviceTiming {
    fn default() -> Self {
        Self {
            publish_interval_ms: 30_000,
            reconnect_interval_ms: 60_000,
        }
    }
}

/// What one loop iteration did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub command: Option<InboundMessage>,
    pub sample: SampleOutcome,
    pub reconnect: Option<ReconnectOutcome>,
}

/// The device: lifecycle manager plus the collaborators it is polled with
pub struct Device<B, P, S> {
    debug: DebugStream,
    manager: ConnectivityManager<B, P>,
    scheduler: SampleScheduler<S>,
    network: Box<dyn NetworkInfo>,
    updates: Box<dyn UpdateTransport>,
    clock: Box<dyn MonotonicClock + Send>,
    reconnect_timer: IntervalTimer,
}

impl<B, P, S> Device<B, P, S>
where
    B: BrokerClient,
    P: Provisioning,
    S: SensorDriver,
{
    pub fn new(
        debug: DebugStream,
        manager: ConnectivityManager<B, P>,
        sensor: S,
        network: Box<dyn NetworkInfo>,
        updates: Box<dyn UpdateTransport>,
        clock: Box<dyn MonotonicClock + Send>,
        timing: DeviceTiming,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            debug,
            manager,
            scheduler: SampleScheduler::new(sensor, timing.publish_interval_ms, now),
            network,
            updates,
            clock,
            reconnect_timer: IntervalTimer::new(timing.reconnect_interval_ms, now),
        }
    }

    pub fn manager(&self) -> &ConnectivityManager<B, P> {
        &self.manager
    }

    /// Banner, sensor and update-transport start, then the first reconnect
    pub async fn startup(&mut self) -> ReconnectOutcome {
        let identity = self.manager.identity().clone();
        let sw_version = self.manager.device().sw_version.clone();

        debugln!(self.debug);
        debugln!(self.debug, "Hello from {}", FIRMWARE_PREFIX);
        debugln!(self.debug, "Version: {}", sw_version);
        debugln!(self.debug, "Chip id: {:X}", identity.chip_id());
        debugln!(self.debug, "Identity: {}", identity);
        info!(identity = %identity, version = %sw_version, "Device starting");

        if let Err(e) = self.scheduler.sensor_mut().begin() {
            debugln!(self.debug, "Sensor init failed: {}", e);
            warn!(error = %e, "Sensor did not start; samples will be skipped");
        }

        self.updates.begin(identity.as_str(), &mut self.debug);

        let outcome = self.manager.reconnect(&mut self.debug).await;
        self.reconnect_timer.fire(self.clock.now_ms());
        outcome
    }

    /// One round-robin pass over every subsystem
    pub async fn tick(&mut self) -> TickReport {
        self.updates.handle(&mut self.debug);

        let command = self.manager.pump(&mut self.debug).await;

        let now = self.clock.now_ms();
        let sample = self
            .scheduler
            .tick(now, &mut self.manager, &*self.network, &mut self.debug)
            .await;

        let reconnect = if !self.manager.is_connected() && self.reconnect_timer.is_due(now) {
            self.reconnect_timer.fire(now);
            Some(self.manager.reconnect(&mut self.debug).await)
        } else {
            None
        };

        TickReport {
            command,
            sample,
            reconnect,
        }
    }

    /// Tick until `shutdown` turns true (or its sender goes away), then
    /// announce offline and disconnect
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>, idle: Duration) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.tick().await;

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(idle) => {}
            }
        }

        info!("Shutting down");
        self.manager.shutdown(&mut self.debug).await;
    }
}
