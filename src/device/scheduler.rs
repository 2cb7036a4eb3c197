//! Sample-and-publish scheduler

use super::lifecycle::ConnectivityManager;
use super::timer::IntervalTimer;
use crate::debug::DebugStream;
use crate::debugln;
use crate::platform::{NetworkInfo, SensorDriver};
use crate::provisioning::Provisioning;
use crate::transport::BrokerClient;
use tracing::debug;

/// What one scheduler tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    NotDue,
    /// The read failed; this cycle is skipped
    SensorFailed,
    Published,
    /// A reading was taken but not delivered
    PublishFailed,
}

/// Reads the sensor once per interval and hands the reading to the
/// connectivity manager
pub struct SampleScheduler<S> {
    sensor: S,
    timer: IntervalTimer,
}

impl<S: SensorDriver> SampleScheduler<S> {
    pub fn new(sensor: S, interval_ms: u32, now: u32) -> Self {
        Self {
            sensor,
            timer: IntervalTimer::new(interval_ms, now),
        }
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Sample and publish if the interval has elapsed.
    ///
    /// Sensor failures skip the cycle without touching connectivity. A
    /// failed publish is left for the next cycle.
    pub async fn tick<B, P, N>(
        &mut self,
        now: u32,
        manager: &mut ConnectivityManager<B, P>,
        network: &N,
        debug: &mut DebugStream,
    ) -> SampleOutcome
    where
        B: BrokerClient,
        P: Provisioning,
        N: NetworkInfo + ?Sized,
    {
        if !self.timer.poll(now) {
            return SampleOutcome::NotDue;
        }

        debugln!(debug, "Read sensor");
        let reading = match self.sensor.sample() {
            Ok(reading) => reading,
            Err(e) => {
                debug!(error = %e, "Sensor read failed, skipping cycle");
                return SampleOutcome::SensorFailed;
            }
        };

        match manager.publish_state(&reading, network.status(), debug).await {
            Ok(()) => SampleOutcome::Published,
            Err(e) => {
                debug!(error = %e, "State not published");
                SampleOutcome::PublishFailed
            }
        }
    }
}
