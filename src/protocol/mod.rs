//! Identity, topic and payload definitions for the telemetry protocol
//!
//! Pure, deterministic builders. Nothing in here performs I/O.

pub mod identity;
pub mod messages;
pub mod topics;

pub use identity::{build_identity, DeviceIdentity, FIRMWARE_PREFIX};
pub use messages::{
    discovery_messages, discovery_payload, DeviceDescriptor, DiscoveryMessage, DiscoveryPayload,
    NetworkStatus, SensorReading, StatePayload, AVAILABILITY_OFFLINE, AVAILABILITY_ONLINE,
    MAX_STATE_PAYLOAD,
};
pub use topics::{build_topics, SensorKind, Topic, TopicSet, TOPIC_CAPACITY};
