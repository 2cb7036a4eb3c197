//! rumqttc-backed broker client
//!
//! The event loop is driven inline by the caller instead of a spawned
//! supervisor task: every request is queued on the client and then the loop
//! is polled until the request has been written out. Inbound publishes seen
//! while flushing are buffered and handed out by [`BrokerClient::poll`].

use super::connection::{configure_mqtt_options, MqttError};
use super::message_handler::{EventRoute, MessageHandler, Request};
use crate::transport::{BrokerClient, ConnectOptions, InboundMessage};
use async_trait::async_trait;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Queue depth between the client handle and its event loop
const REQUEST_CAPACITY: usize = 16;

/// Timing used by [`RumqttBroker`]
#[derive(Debug, Clone)]
pub struct BrokerTimeouts {
    /// How long to wait for the broker's ConnAck
    pub connect: Duration,
    /// How long to wait for a queued request to reach the socket
    pub flush: Duration,
    /// How long one [`BrokerClient::poll`] call may block
    pub poll_slice: Duration,
}

impl Default for BrokerTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            flush: Duration::from_secs(5),
            poll_slice: Duration::from_millis(50),
        }
    }
}

struct Session {
    client: AsyncClient,
    event_loop: EventLoop,
}

/// MQTT v5 broker client
pub struct RumqttBroker {
    session: Option<Session>,
    pending: VecDeque<InboundMessage>,
    timeouts: BrokerTimeouts,
}

impl RumqttBroker {
    pub fn new() -> Self {
        Self::with_timeouts(BrokerTimeouts::default())
    }

    pub fn with_timeouts(timeouts: BrokerTimeouts) -> Self {
        Self {
            session: None,
            pending: VecDeque::new(),
            timeouts,
        }
    }

    fn drop_session(&mut self, reason: &str) {
        if self.session.take().is_some() {
            warn!("MQTT session dropped: {}", reason);
        }
    }

    /// Poll the event loop until `request` has been written to the socket
    async fn flush(&mut self, request: Request) -> Result<(), MqttError> {
        let timeout = self.timeouts.flush;
        let Some(session) = self.session.as_mut() else {
            return Err(MqttError::NotConnected);
        };
        let pending = &mut self.pending;

        let result = tokio::time::timeout(timeout, async {
            loop {
                let event = session
                    .event_loop
                    .poll()
                    .await
                    .map_err(|e| MqttError::ConnectionLost(Box::new(e)))?;
                match MessageHandler::route_mqtt_event(&event) {
                    EventRoute::RequestWritten(written) if written == request => return Ok(()),
                    EventRoute::MessageReceived { topic, payload, .. } => {
                        pending.push_back(InboundMessage { topic, payload });
                    }
                    EventRoute::Disconnected => {
                        return Err(MqttError::ConnectionLost(
                            "broker closed the session".into(),
                        ));
                    }
                    other => debug!(target: "mqtt_transport", "MQTT event: {:?}", other),
                }
            }
        })
        .await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.drop_session(&e.to_string());
                Err(e)
            }
            Err(_) => Err(MqttError::FlushTimeout(timeout)),
        }
    }
}

impl Default for RumqttBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerClient for RumqttBroker {
    type Error = MqttError;

    async fn connect(&mut self, options: &ConnectOptions) -> Result<(), MqttError> {
        self.session = None;
        self.pending.clear();

        let mqtt_options = configure_mqtt_options(options)?;
        let (host, port) = mqtt_options.broker_address();
        debug!(host = %host, port, client_id = %options.client_id, "Connecting to MQTT broker");

        let (client, mut event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);
        let timeout = self.timeouts.connect;
        let pending = &mut self.pending;

        let result = tokio::time::timeout(timeout, async {
            loop {
                let event = event_loop
                    .poll()
                    .await
                    .map_err(|e| MqttError::ConnectionFailed(Box::new(e)))?;
                match MessageHandler::route_mqtt_event(&event) {
                    EventRoute::ConnectionAcknowledged => return Ok(()),
                    EventRoute::MessageReceived { topic, payload, .. } => {
                        pending.push_back(InboundMessage { topic, payload });
                    }
                    EventRoute::Disconnected => {
                        return Err(MqttError::ConnectionFailed(
                            "broker closed the session during connect".into(),
                        ));
                    }
                    _ => {}
                }
            }
        })
        .await;

        match result {
            Ok(Ok(())) => {
                info!(host = %host, port, "MQTT session established");
                self.session = Some(Session { client, event_loop });
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(MqttError::ConnAckTimeout(timeout)),
        }
    }

    async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), MqttError> {
        let session = self.session.as_ref().ok_or(MqttError::NotConnected)?;
        session
            .client
            .try_publish(topic, QoS::AtLeastOnce, retain, payload.to_vec())
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;
        self.flush(Request::Publish).await
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        let session = self.session.as_ref().ok_or(MqttError::NotConnected)?;
        session
            .client
            .try_subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| MqttError::SubscriptionFailed(Box::new(e)))?;
        self.flush(Request::Subscribe).await
    }

    async fn poll(&mut self) -> Result<Option<InboundMessage>, MqttError> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(Some(message));
        }
        let slice = self.timeouts.poll_slice;
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };

        match tokio::time::timeout(slice, session.event_loop.poll()).await {
            Err(_) => Ok(None),
            Ok(Ok(event)) => match MessageHandler::route_mqtt_event(&event) {
                EventRoute::MessageReceived { topic, payload, .. } => {
                    Ok(Some(InboundMessage { topic, payload }))
                }
                EventRoute::Disconnected => {
                    self.drop_session("broker closed the session");
                    Ok(None)
                }
                other => {
                    debug!(target: "mqtt_transport", "MQTT event: {:?}", other);
                    Ok(None)
                }
            },
            Ok(Err(e)) => {
                let error = MqttError::ConnectionLost(Box::new(e));
                self.drop_session(&error.to_string());
                Err(error)
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), MqttError> {
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };
        if let Err(e) = session.client.try_disconnect() {
            debug!("Disconnect request not queued: {}", e);
        }
        // Best effort: the session is discarded either way
        let flushed = self.flush(Request::Disconnect).await;
        self.session = None;
        self.pending.clear();
        if let Err(e) = flushed {
            debug!("Disconnect not confirmed: {}", e);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::WillMessage;

    fn unreachable_options() -> ConnectOptions {
        ConnectOptions {
            // Port 1 on loopback refuses immediately
            server: "127.0.0.1".to_string(),
            port: 1,
            client_id: "AHT10-TEST".to_string(),
            username: None,
            password: None,
            will: WillMessage {
                topic: "AHT10-TEST/availability".to_string(),
                payload: b"offline".to_vec(),
                retain: true,
            },
            keep_alive: Duration::from_secs(10),
            max_packet_size: 2048,
        }
    }

    #[tokio::test]
    async fn test_operations_fail_without_connection() {
        let mut broker = RumqttBroker::new();
        assert!(!broker.is_connected());
        assert!(matches!(
            broker.publish("topic", b"x", false).await,
            Err(MqttError::NotConnected)
        ));
        assert!(matches!(
            broker.subscribe("topic").await,
            Err(MqttError::NotConnected)
        ));
        assert!(broker.poll().await.unwrap().is_none());
        assert!(broker.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let mut broker = RumqttBroker::with_timeouts(BrokerTimeouts {
            connect: Duration::from_secs(2),
            ..BrokerTimeouts::default()
        });
        let result = broker.connect(&unreachable_options()).await;
        assert!(result.is_err());
        assert!(!broker.is_connected());
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_address() {
        let mut broker = RumqttBroker::new();
        let mut options = unreachable_options();
        options.server = "http://broker.local".to_string();
        assert!(matches!(
            broker.connect(&options).await,
            Err(MqttError::UnsupportedScheme(_))
        ));
    }
}
