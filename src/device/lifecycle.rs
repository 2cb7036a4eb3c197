//! Connectivity lifecycle manager
//!
//! Owns the broker client, the provisioning handle, the identity and topic
//! set, and the connection state. Every state transition happens here.

use crate::debug::DebugStream;
use crate::debugln;
use crate::protocol::{
    build_topics, discovery_messages, DeviceDescriptor, DeviceIdentity, NetworkStatus,
    SensorReading, StatePayload, TopicSet, AVAILABILITY_OFFLINE, AVAILABILITY_ONLINE,
    MAX_STATE_PAYLOAD,
};
use crate::provisioning::Provisioning;
use crate::transport::{BrokerClient, ConnectOptions, InboundMessage, WillMessage};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Connection state as tracked by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Bounded count of failed attempts in one reconnect sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    used: u32,
    limit: u32,
}

impl RetryBudget {
    pub fn new(limit: u32) -> Self {
        Self { used: 0, limit }
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Count a failed attempt. Returns true while attempts remain.
    pub fn record_failure(&mut self) -> bool {
        self.used = self.used.saturating_add(1).min(self.limit);
        !self.is_exhausted()
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.limit - self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

/// Fixed-delay retry policy for a reconnect sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_delay: Duration::from_secs(3),
        }
    }
}

/// Session parameters that come from configuration rather than provisioning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub port: u16,
    pub keep_alive: Duration,
    pub max_packet_size: u32,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            port: 1883,
            keep_alive: Duration::from_secs(10),
            max_packet_size: 2048,
            username: None,
            password: None,
        }
    }
}

/// Result of one reconnect sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// Session established on the given attempt (1-based)
    Connected { attempts: u32 },
    /// Every attempt in the budget failed
    Exhausted { attempts: u32 },
    /// No broker address even after reprompting
    Unconfigured,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Not connected to the broker")]
    NotConnected,
    #[error("Publish to {topic} failed")]
    Publish {
        topic: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Subscribe to {topic} failed")]
    Subscribe {
        topic: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Payload for {topic} is {size} bytes, limit is {limit}")]
    PayloadTooLarge {
        topic: String,
        size: usize,
        limit: usize,
    },
    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),
}

/// Bytes of an MQTT v5 PUBLISH that are not topic or payload: fixed header
/// with a four-byte remaining length, topic length prefix, packet id and an
/// empty property block
const PUBLISH_OVERHEAD: usize = 5 + 2 + 2 + 1;

/// Largest payload that fits a PUBLISH to `topic` under `max_packet_size`
pub fn publish_payload_limit(max_packet_size: u32, topic: &str) -> usize {
    (max_packet_size as usize)
        .saturating_sub(topic.len())
        .saturating_sub(PUBLISH_OVERHEAD)
}

/// Owner of the broker session and its lifecycle
pub struct ConnectivityManager<B, P> {
    broker: B,
    provisioning: P,
    identity: DeviceIdentity,
    topics: TopicSet,
    device: DeviceDescriptor,
    session: SessionOptions,
    policy: ReconnectPolicy,
    budget: RetryBudget,
    state: BrokerConnectionState,
}

impl<B, P> ConnectivityManager<B, P>
where
    B: BrokerClient,
    P: Provisioning,
{
    pub fn new(
        broker: B,
        provisioning: P,
        identity: DeviceIdentity,
        device: DeviceDescriptor,
        session: SessionOptions,
        policy: ReconnectPolicy,
    ) -> Self {
        let topics = build_topics(&identity);
        let budget = RetryBudget::new(policy.max_attempts);
        Self {
            broker,
            provisioning,
            identity,
            topics,
            device,
            session,
            policy,
            budget,
            state: BrokerConnectionState::Disconnected,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }

    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    pub fn state(&self) -> BrokerConnectionState {
        self.state
    }

    pub fn retry_budget(&self) -> &RetryBudget {
        &self.budget
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn provisioning(&self) -> &P {
        &self.provisioning
    }

    /// Connected as far as the manager knows and the client agrees
    pub fn is_connected(&self) -> bool {
        self.state == BrokerConnectionState::Connected && self.broker.is_connected()
    }

    /// Options for the next connection attempt
    pub fn connect_options(&self) -> ConnectOptions {
        let settings = self.provisioning.settings();
        let username = settings
            .username
            .clone()
            .or_else(|| self.session.username.clone());
        let password = settings
            .password
            .clone()
            .or_else(|| self.session.password.clone());

        ConnectOptions {
            server: settings.mqtt_server.trim().to_string(),
            port: self.session.port,
            client_id: self.identity.as_str().to_string(),
            username,
            password,
            will: WillMessage {
                topic: self.topics.availability.to_string(),
                payload: AVAILABILITY_OFFLINE.as_bytes().to_vec(),
                retain: true,
            },
            keep_alive: self.session.keep_alive,
            max_packet_size: self.session.max_packet_size,
        }
    }

    /// Run one reconnect sequence.
    ///
    /// An empty broker address escalates to provisioning before any attempt.
    /// Otherwise up to `max_attempts` connects are made with a fixed delay
    /// between them. Exhaustion is not an error: the caller retries on its
    /// next reconnect check.
    pub async fn reconnect(&mut self, debug: &mut DebugStream) -> ReconnectOutcome {
        debugln!(debug, "Reconnect MQTT...");

        if !self.provisioning.settings().is_configured() {
            debugln!(debug, "Missing MQTT server, resetting and asking user.");
            warn!("Broker address missing, escalating to provisioning");
            if let Err(e) = self.provisioning.reset_and_reprompt(&mut *debug).await {
                warn!("Provisioning did not complete: {}", e);
            }
            if !self.provisioning.settings().is_configured() {
                self.state = BrokerConnectionState::Disconnected;
                return ReconnectOutcome::Unconfigured;
            }
        }

        self.state = BrokerConnectionState::Connecting;
        self.budget.reset();
        let options = self.connect_options();

        loop {
            let attempt = self.budget.used();
            debugln!(debug, "Attempt {}", attempt);
            debugln!(debug, "mqtt: {}", options.server);
            info!(
                attempt = attempt + 1,
                max_attempts = self.budget.limit(),
                server = %options.server,
                "Connecting to broker"
            );

            match self.broker.connect(&options).await {
                Ok(()) => {
                    debugln!(debug, "Mqtt connected");
                    self.announce(debug).await;
                    self.state = BrokerConnectionState::Connected;
                    info!(attempts = attempt + 1, "Broker session established");
                    return ReconnectOutcome::Connected {
                        attempts: attempt + 1,
                    };
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Broker connection attempt failed");
                }
            }

            if !self.budget.record_failure() {
                self.state = BrokerConnectionState::Disconnected;
                warn!(
                    attempts = self.budget.used(),
                    "Reconnect budget exhausted, will retry on the next check"
                );
                return ReconnectOutcome::Exhausted {
                    attempts: self.budget.used(),
                };
            }
            tokio::time::sleep(self.policy.retry_delay).await;
        }
    }

    /// Post-connect sequence: online marker, discovery, then the command
    /// subscription. The subscription comes last so commands never act on
    /// defaults.
    async fn announce(&mut self, debug: &mut DebugStream) {
        let availability = self.topics.availability.to_string();
        if let Err(e) = self
            .publish_retained(&availability, AVAILABILITY_ONLINE.as_bytes())
            .await
        {
            debugln!(debug, "Publish failed: {}", e);
            warn!(error = %e, "Availability publish failed");
        }

        // Each failed document is reported by publish_discovery itself
        let _ = self.publish_discovery(debug).await;

        let command = self.topics.command.to_string();
        match self.broker.subscribe(&command).await {
            Ok(()) => debug!(topic = %command, "Subscribed to command topic"),
            Err(e) => {
                let error = LifecycleError::Subscribe {
                    topic: command,
                    source: Box::new(e),
                };
                debugln!(debug, "Subscribe failed: {}", error);
                warn!(error = %error, "Command subscription failed");
            }
        }
    }

    /// Publish the retained discovery documents, one per advertised sensor.
    ///
    /// Every document is attempted even when an earlier one fails; the first
    /// failure is returned once all have been tried. The documents depend
    /// only on the identity and topics, so repeated calls send identical
    /// bytes.
    pub async fn publish_discovery(
        &mut self,
        debug: &mut DebugStream,
    ) -> Result<(), LifecycleError> {
        let messages = discovery_messages(&self.identity, &self.topics, &self.device)?;
        let mut first_error = None;

        for message in &messages {
            let limit = publish_payload_limit(self.session.max_packet_size, &message.topic);
            let result = if message.payload.len() > limit {
                Err(LifecycleError::PayloadTooLarge {
                    topic: message.topic.clone(),
                    size: message.payload.len(),
                    limit,
                })
            } else {
                self.publish_retained(&message.topic, &message.payload).await
            };

            match result {
                Ok(()) => {
                    debug!(topic = %message.topic, sensor = %message.kind, "Discovery published")
                }
                Err(e) => {
                    debugln!(debug, "Discovery failed: {}", e);
                    warn!(sensor = %message.kind, error = %e, "Discovery publish failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Publish one state document (retained). Failures are reported, never
    /// retried here.
    pub async fn publish_state(
        &mut self,
        reading: &SensorReading,
        network: NetworkStatus,
        debug: &mut DebugStream,
    ) -> Result<(), LifecycleError> {
        if !self.is_connected() {
            return Err(LifecycleError::NotConnected);
        }

        let state = self.topics.state.to_string();
        let payload = serde_json::to_vec(&StatePayload::new(reading, network))?;
        if payload.len() > MAX_STATE_PAYLOAD {
            let error = LifecycleError::PayloadTooLarge {
                topic: state,
                size: payload.len(),
                limit: MAX_STATE_PAYLOAD,
            };
            debugln!(debug, "Publish failed: {}", error);
            return Err(error);
        }

        debugln!(debug, "Publish");
        debugln!(debug, "{}", String::from_utf8_lossy(&payload));
        if let Err(e) = self.publish_retained(&state, &payload).await {
            debugln!(debug, "Publish failed: {}", e);
            return Err(e);
        }
        Ok(())
    }

    /// Service the broker session once.
    ///
    /// Inbound command messages are written to the debug stream and
    /// returned. A dropped session moves the manager to `Disconnected`.
    pub async fn pump(&mut self, debug: &mut DebugStream) -> Option<InboundMessage> {
        if self.state != BrokerConnectionState::Connected {
            return None;
        }

        let received = match self.broker.poll().await {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Broker session error");
                None
            }
        };

        if let Some(message) = &received {
            debugln!(
                debug,
                "command: {}: {} ({})",
                message.topic,
                String::from_utf8_lossy(&message.payload),
                message.payload.len()
            );
        }

        if !self.broker.is_connected() {
            self.state = BrokerConnectionState::Disconnected;
            debugln!(debug, "MQTT connection lost");
            warn!("Broker session dropped");
        }
        received
    }

    /// Announce `offline` and close the session
    pub async fn shutdown(&mut self, debug: &mut DebugStream) {
        if self.is_connected() {
            let availability = self.topics.availability.to_string();
            if let Err(e) = self
                .publish_retained(&availability, AVAILABILITY_OFFLINE.as_bytes())
                .await
            {
                warn!(error = %e, "Offline announcement failed");
            }
        }
        if let Err(e) = self.broker.disconnect().await {
            warn!(error = %e, "Broker disconnect failed");
        }
        self.state = BrokerConnectionState::Disconnected;
        debugln!(debug, "MQTT disconnected");
    }

    async fn publish_retained(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), LifecycleError> {
        self.broker
            .publish(topic, payload, true)
            .await
            .map_err(|e| LifecycleError::Publish {
                topic: topic.to_string(),
                source: Box::new(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_budget() {
        let mut budget = RetryBudget::new(3);
        assert_eq!(budget.remaining(), 3);
        assert!(budget.record_failure());
        assert!(budget.record_failure());
        assert!(!budget.record_failure());
        assert!(budget.is_exhausted());
        assert_eq!(budget.used(), 3);
        assert!(!budget.record_failure());
        assert_eq!(budget.used(), 3);

        budget.reset();
        assert_eq!(budget.used(), 0);
        assert!(!budget.is_exhausted());
    }

    #[test]
    fn test_reconnect_policy_default() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.retry_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_publish_payload_limit_accounts_for_topic_and_header() {
        assert_eq!(publish_payload_limit(2048, "a/b"), 2048 - 3 - 10);
        assert_eq!(publish_payload_limit(8, "topic"), 0);
    }

    #[test]
    fn test_lifecycle_error_display() {
        let error = LifecycleError::PayloadTooLarge {
            topic: "t".to_string(),
            size: 300,
            limit: 256,
        };
        assert_eq!(error.to_string(), "Payload for t is 300 bytes, limit is 256");
        assert_eq!(
            LifecycleError::NotConnected.to_string(),
            "Not connected to the broker"
        );
    }
}
