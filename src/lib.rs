//! AHT10 environment sensor
//!
//! A telemetry daemon that samples an AHT10 temperature/humidity sensor and
//! publishes the readings to an MQTT broker, announcing itself to Home
//! Assistant through retained discovery documents.
//!
//! # Overview
//!
//! - Deterministic identity, topic and payload builders ([`protocol`])
//! - A fan-out debug text stream over pluggable sinks ([`debug`])
//! - The connectivity lifecycle: bounded reconnect, last will, discovery,
//!   command subscription and periodic state publishing ([`device`])
//! - A rumqttc-backed broker client ([`transport`])
//! - File-backed provisioning of the broker address ([`provisioning`])
//!
//! # Quick Start
//!
//! ```rust
//! use envsensor::protocol::{build_identity, build_topics};
//!
//! let identity = build_identity(0x00AB_CDEF);
//! let topics = build_topics(&identity);
//!
//! assert_eq!(identity.as_str(), "AHT10-ABCDEF");
//! assert_eq!(topics.state.as_str(), "aht10-env-sensor/AHT10-ABCDEF/state");
//! ```

pub mod config;
pub mod debug;
pub mod device;
pub mod error;
pub mod observability;
pub mod platform;
pub mod protocol;
pub mod provisioning;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, DeviceConfig};
pub use debug::{DebugStream, TextSink};
pub use device::{ConnectivityManager, Device, ReconnectOutcome};
pub use error::DeviceError;
pub use protocol::{build_identity, build_topics, DeviceIdentity, TopicSet};
pub use provisioning::{FilePortal, PersistedSettings, Provisioning};
pub use transport::{BrokerClient, MqttBroker};
