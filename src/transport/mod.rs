//! Broker transport abstraction
//!
//! The connectivity manager talks to the broker only through
//! [`BrokerClient`], so tests can substitute a scripted broker and the
//! production build uses the rumqttc client in [`mqtt`].

use std::time::Duration;

pub mod mqtt;

/// Message registered with the broker at connect time and delivered if the
/// device drops off without a clean disconnect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WillMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// Everything needed for one connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Broker address as provisioned: a bare host, `host:port`, or `mqtt://host[:port]`
    pub server: String,
    /// Port used when the address does not carry one
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub will: WillMessage,
    pub keep_alive: Duration,
    pub max_packet_size: u32,
}

/// A publish received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Connection to a publish/subscribe broker
#[async_trait::async_trait]
pub trait BrokerClient: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a session. Succeeds only once the broker has acknowledged it.
    async fn connect(&mut self, options: &ConnectOptions) -> Result<(), Self::Error>;

    /// Publish at-least-once to `topic`
    async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool)
        -> Result<(), Self::Error>;

    /// Subscribe at-least-once to `topic`
    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Service the session, returning at most one inbound message.
    ///
    /// Returns promptly when there is nothing to do. A dropped session is
    /// reported through [`BrokerClient::is_connected`] afterwards.
    async fn poll(&mut self) -> Result<Option<InboundMessage>, Self::Error>;

    /// Close the session
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Whether the session is currently up
    fn is_connected(&self) -> bool;
}

/// Production broker client
pub type MqttBroker = mqtt::RumqttBroker;
