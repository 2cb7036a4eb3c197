//! MQTT v5 implementation of [`BrokerClient`](crate::transport::BrokerClient)
//!
//! - [`connection`] - pure option building and address parsing
//! - [`message_handler`] - pure routing of rumqttc events
//! - [`client`] - the I/O side, driving the rumqttc event loop

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::{BrokerTimeouts, RumqttBroker};
pub use connection::{configure_mqtt_options, parse_broker_address, MqttError};
pub use message_handler::{EventRoute, MessageHandler, Request};
