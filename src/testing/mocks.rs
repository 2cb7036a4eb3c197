//! Mock implementations for testing
//!
//! Scripted stand-ins for the broker, sensor, provisioning, clock, network,
//! update transport and debug sinks. Handles are cheap clones that share
//! state, so a test keeps one while the device owns another.

use crate::debug::TextSink;
use crate::device::events::{LifecycleEvent, LifecycleListener};
use crate::platform::{MonotonicClock, NetworkInfo, SensorDriver, SensorError, UpdateTransport};
use crate::protocol::NetworkStatus;
use crate::provisioning::{PersistedSettings, Provisioning, ProvisioningError};
use crate::transport::{BrokerClient, ConnectOptions, InboundMessage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One call observed by [`ScriptedBroker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerCall {
    Connect {
        client_id: String,
        server: String,
        will_topic: String,
        will_payload: Vec<u8>,
        will_retain: bool,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    Subscribe {
        topic: String,
    },
    Disconnect,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MockBrokerError {
    #[error("Mock connection refused")]
    Refused,
    #[error("Mock broker not connected")]
    NotConnected,
    #[error("Mock publish rejected")]
    PublishRejected,
}

#[derive(Debug, Default)]
struct BrokerState {
    calls: Vec<BrokerCall>,
    connected: bool,
    connect_failures: u32,
    always_refuse: bool,
    reject_publishes: bool,
    rejected_topics: Vec<String>,
    inbound: VecDeque<InboundMessage>,
    drop_on_poll: bool,
}

/// Mock broker for testing
#[derive(Debug, Clone, Default)]
pub struct ScriptedBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl ScriptedBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broker that refuses every connection
    pub fn refusing() -> Self {
        let broker = Self::new();
        lock(&broker.state).always_refuse = true;
        broker
    }

    /// Refuse the next `count` connection attempts
    pub fn fail_next_connects(&self, count: u32) {
        lock(&self.state).connect_failures = count;
    }

    pub fn set_refusing(&self, refusing: bool) {
        lock(&self.state).always_refuse = refusing;
    }

    pub fn set_reject_publishes(&self, reject: bool) {
        lock(&self.state).reject_publishes = reject;
    }

    /// Reject every publish to `topic`, leaving other topics untouched
    pub fn reject_publishes_to(&self, topic: &str) {
        lock(&self.state).rejected_topics.push(topic.to_string());
    }

    /// Queue a message for delivery by the next poll
    pub fn push_inbound(&self, topic: &str, payload: &[u8]) {
        lock(&self.state).inbound.push_back(InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    /// Drop the session on the next poll, as a broker restart would
    pub fn drop_on_next_poll(&self) {
        lock(&self.state).drop_on_poll = true;
    }

    pub fn calls(&self) -> Vec<BrokerCall> {
        lock(&self.state).calls.clone()
    }

    pub fn connect_count(&self) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| matches!(call, BrokerCall::Connect { .. }))
            .count()
    }

    /// Every publish as (topic, payload, retain)
    pub fn published(&self) -> Vec<(String, Vec<u8>, bool)> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|call| match call {
                BrokerCall::Publish {
                    topic,
                    payload,
                    retain,
                } => Some((topic.clone(), payload.clone(), *retain)),
                _ => None,
            })
            .collect()
    }

    /// Publishes to one topic, payloads only
    pub fn published_to(&self, topic: &str) -> Vec<Vec<u8>> {
        self.published()
            .into_iter()
            .filter(|(published, _, _)| published == topic)
            .map(|(_, payload, _)| payload)
            .collect()
    }

    pub fn clear_history(&self) {
        lock(&self.state).calls.clear();
    }
}

#[async_trait]
impl BrokerClient for ScriptedBroker {
    type Error = MockBrokerError;

    async fn connect(&mut self, options: &ConnectOptions) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        state.calls.push(BrokerCall::Connect {
            client_id: options.client_id.clone(),
            server: options.server.clone(),
            will_topic: options.will.topic.clone(),
            will_payload: options.will.payload.clone(),
            will_retain: options.will.retain,
        });

        if state.always_refuse {
            return Err(MockBrokerError::Refused);
        }
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(MockBrokerError::Refused);
        }
        state.connected = true;
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        state.calls.push(BrokerCall::Publish {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain,
        });
        if !state.connected {
            return Err(MockBrokerError::NotConnected);
        }
        if state.reject_publishes || state.rejected_topics.iter().any(|t| t == topic) {
            return Err(MockBrokerError::PublishRejected);
        }
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        state.calls.push(BrokerCall::Subscribe {
            topic: topic.to_string(),
        });
        if !state.connected {
            return Err(MockBrokerError::NotConnected);
        }
        Ok(())
    }

    async fn poll(&mut self) -> Result<Option<InboundMessage>, Self::Error> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Ok(None);
        }
        if state.drop_on_poll {
            state.drop_on_poll = false;
            state.connected = false;
            return Err(MockBrokerError::NotConnected);
        }
        Ok(state.inbound.pop_front())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        state.calls.push(BrokerCall::Disconnect);
        state.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
}

#[derive(Debug)]
struct SensorState {
    reading: (f32, f32),
    failures: u32,
    begun: bool,
    reads: u32,
}

/// Mock sensor returning a fixed reading, optionally failing
#[derive(Debug, Clone)]
pub struct MockSensor {
    state: Arc<Mutex<SensorState>>,
    temperature: f32,
    humidity: f32,
}

impl MockSensor {
    pub fn new(temperature_celsius: f32, relative_humidity_percent: f32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SensorState {
                reading: (temperature_celsius, relative_humidity_percent),
                failures: 0,
                begun: false,
                reads: 0,
            })),
            temperature: 0.0,
            humidity: 0.0,
        }
    }

    /// Fail the next `count` reads
    pub fn fail_next_reads(&self, count: u32) {
        lock(&self.state).failures = count;
    }

    pub fn set_reading(&self, temperature_celsius: f32, relative_humidity_percent: f32) {
        lock(&self.state).reading = (temperature_celsius, relative_humidity_percent);
    }

    pub fn began(&self) -> bool {
        lock(&self.state).begun
    }

    /// Read attempts so far, failed ones included
    pub fn reads(&self) -> u32 {
        lock(&self.state).reads
    }
}

impl SensorDriver for MockSensor {
    fn begin(&mut self) -> Result<(), SensorError> {
        lock(&self.state).begun = true;
        Ok(())
    }

    fn read_raw_data(&mut self) -> Result<(), SensorError> {
        let mut state = lock(&self.state);
        state.reads += 1;
        if state.failures > 0 {
            state.failures -= 1;
            return Err(SensorError::Unavailable("scripted failure".to_string()));
        }
        let (temperature, humidity) = state.reading;
        drop(state);
        self.temperature = temperature;
        self.humidity = humidity;
        Ok(())
    }

    fn read_temperature(&self) -> f32 {
        self.temperature
    }

    fn read_humidity(&self) -> f32 {
        self.humidity
    }
}

/// Mock provisioning with a scripted reprompt result
#[derive(Debug, Default)]
pub struct MockProvisioning {
    settings: PersistedSettings,
    reprompt_result: Option<PersistedSettings>,
    reprompts: u32,
}

impl MockProvisioning {
    pub fn configured(mqtt_server: &str) -> Self {
        Self {
            settings: PersistedSettings::new(mqtt_server),
            ..Self::default()
        }
    }

    /// No broker address; reprompting yields nothing
    pub fn unconfigured() -> Self {
        Self::default()
    }

    /// Settings supplied when the portal is opened
    pub fn with_reprompt_result(mut self, settings: PersistedSettings) -> Self {
        self.reprompt_result = Some(settings);
        self
    }

    pub fn reprompts(&self) -> u32 {
        self.reprompts
    }
}

#[async_trait]
impl Provisioning for MockProvisioning {
    fn settings(&self) -> &PersistedSettings {
        &self.settings
    }

    async fn reset_and_reprompt(
        &mut self,
        listener: &mut dyn LifecycleListener,
    ) -> Result<(), ProvisioningError> {
        self.reprompts += 1;
        self.settings = PersistedSettings::default();
        listener.notify(LifecycleEvent::ConfigPortalEntered {
            portal: "mock-portal".to_string(),
        });
        match self.reprompt_result.clone() {
            Some(settings) => {
                listener.notify(LifecycleEvent::ConfigSaved);
                self.settings = settings;
                Ok(())
            }
            None => Err(ProvisioningError::PortalTimeout(Duration::ZERO)),
        }
    }
}

/// Manually advanced millisecond clock
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn starting_at(now: u32) -> Self {
        Self {
            now: Arc::new(AtomicU32::new(now)),
        }
    }

    /// Advance, wrapping at `u32::MAX`
    pub fn advance(&self, ms: u32) {
        // fetch_add wraps on overflow
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, now: u32) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl MonotonicClock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Fixed network status
#[derive(Debug, Clone)]
pub struct StaticNetwork {
    pub status: NetworkStatus,
}

impl StaticNetwork {
    pub fn new(ssid: &str, ip: &str, rssi: i32) -> Self {
        Self {
            status: NetworkStatus {
                ssid: ssid.to_string(),
                ip: ip.to_string(),
                rssi,
            },
        }
    }
}

impl NetworkInfo for StaticNetwork {
    fn status(&self) -> NetworkStatus {
        self.status.clone()
    }
}

/// Update transport that raises queued events on the next `handle`
#[derive(Debug, Clone, Default)]
pub struct ScriptedUpdates {
    pending: Arc<Mutex<Vec<LifecycleEvent>>>,
    hostname: Arc<Mutex<Option<String>>>,
}

impl ScriptedUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, event: LifecycleEvent) {
        lock(&self.pending).push(event);
    }

    pub fn hostname(&self) -> Option<String> {
        lock(&self.hostname).clone()
    }
}

impl UpdateTransport for ScriptedUpdates {
    fn begin(&mut self, hostname: &str, _listener: &mut dyn LifecycleListener) {
        *lock(&self.hostname) = Some(hostname.to_string());
    }

    fn handle(&mut self, listener: &mut dyn LifecycleListener) {
        let events: Vec<LifecycleEvent> = lock(&self.pending).drain(..).collect();
        for event in events {
            listener.notify(event);
        }
    }
}

/// Sink that counts calls and accepts at most `limit` bytes per call
#[derive(Debug, Clone)]
pub struct CountingSink {
    calls: Arc<AtomicUsize>,
    limit: Option<usize>,
}

impl CountingSink {
    pub fn accepting_all() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            limit: None,
        }
    }

    pub fn accepting_at_most(limit: usize) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            limit: Some(limit),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextSink for CountingSink {
    fn write(&mut self, buf: &[u8]) -> usize {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.limit {
            Some(limit) => limit.min(buf.len()),
            None => buf.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::WillMessage;

    fn options() -> ConnectOptions {
        ConnectOptions {
            server: "broker".to_string(),
            port: 1883,
            client_id: "AHT10-1".to_string(),
            username: None,
            password: None,
            will: WillMessage {
                topic: "t/status".to_string(),
                payload: b"offline".to_vec(),
                retain: true,
            },
            keep_alive: Duration::from_secs(10),
            max_packet_size: 2048,
        }
    }

    #[tokio::test]
    async fn test_scripted_broker_failures_then_success() {
        let mut broker = ScriptedBroker::new();
        broker.fail_next_connects(2);

        assert!(broker.connect(&options()).await.is_err());
        assert!(broker.connect(&options()).await.is_err());
        assert!(broker.connect(&options()).await.is_ok());
        assert!(broker.is_connected());
        assert_eq!(broker.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_scripted_broker_records_publishes() {
        let mut broker = ScriptedBroker::new();
        let handle = broker.clone();
        broker.connect(&options()).await.unwrap();
        broker.publish("a", b"1", true).await.unwrap();

        assert_eq!(
            handle.published(),
            vec![("a".to_string(), b"1".to_vec(), true)]
        );
    }

    #[test]
    fn test_manual_clock_wraps() {
        let clock = ManualClock::starting_at(u32::MAX);
        clock.advance(2);
        assert_eq!(clock.now_ms(), 1);
    }

    #[test]
    fn test_mock_sensor_failures() {
        let mut sensor = MockSensor::new(21.5, 47.2);
        sensor.fail_next_reads(1);
        assert!(sensor.sample().is_err());
        let reading = sensor.sample().unwrap();
        assert_eq!(reading.temperature_celsius, 21.5);
        assert_eq!(sensor.reads(), 2);
    }
}
