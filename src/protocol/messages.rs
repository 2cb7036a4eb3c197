//! Wire payloads: availability markers, the periodic state document and the
//! Home Assistant discovery documents.

use super::identity::DeviceIdentity;
use super::topics::{SensorKind, TopicSet};
use serde::{Deserialize, Serialize};

/// Availability payload published after a successful connect (retained)
pub const AVAILABILITY_ONLINE: &str = "online";

/// Availability payload carried by the last will (retained)
pub const AVAILABILITY_OFFLINE: &str = "offline";

/// Upper bound for a serialized state document
pub const MAX_STATE_PAYLOAD: usize = 256;

/// One successful sample from the sensor driver. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature_celsius: f32,
    pub relative_humidity_percent: f32,
}

/// Network status embedded in every state document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub ssid: String,
    pub ip: String,
    pub rssi: i32,
}

/// State document: `{"degC":..,"relHumid":..,"wifi":{"ssid":..,"ip":..,"rssi":..}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    #[serde(rename = "degC")]
    pub deg_c: f32,
    #[serde(rename = "relHumid")]
    pub rel_humid: f32,
    pub wifi: NetworkStatus,
}

impl StatePayload {
    pub fn new(reading: &SensorReading, wifi: NetworkStatus) -> Self {
        Self {
            deg_c: reading.temperature_celsius,
            rel_humid: reading.relative_humidity_percent,
            wifi,
        }
    }
}

/// Device block shared by every discovery document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub identifiers: Vec<String>,
    pub model: String,
    pub name: String,
    pub sw_version: String,
}

impl DeviceDescriptor {
    pub fn new(identity: &DeviceIdentity, model: &str, sw_version: &str) -> Self {
        Self {
            identifiers: vec![identity.as_str().to_string()],
            model: model.to_string(),
            name: identity.as_str().to_string(),
            sw_version: sw_version.to_string(),
        }
    }
}

/// Home Assistant sensor auto-configuration document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryPayload {
    pub device: DeviceDescriptor,
    pub availability_topic: String,
    pub state_topic: String,
    pub name: String,
    pub value_template: String,
    pub unique_id: String,
    pub unit_of_measurement: String,
    pub icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_attributes_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_attributes_template: Option<String>,
}

/// Per-sensor presentation details
struct SensorProfile {
    label: &'static str,
    value_template: &'static str,
    unit: &'static str,
    icon: &'static str,
}

fn profile(kind: SensorKind) -> SensorProfile {
    match kind {
        SensorKind::Wifi => SensorProfile {
            label: "WiFi",
            value_template: "{{value_json.wifi.rssi}}",
            unit: "dBm",
            icon: "mdi:wifi",
        },
        SensorKind::Pm25 => SensorProfile {
            label: "PM 2.5",
            value_template: "{{value_json.pm25}}",
            unit: "μg/m³",
            icon: "mdi:air-filter",
        },
        SensorKind::Temperature => SensorProfile {
            label: "Degrees C",
            value_template: "{{value_json.degC}}",
            unit: "C",
            icon: "mdi:thermometer",
        },
        SensorKind::Humidity => SensorProfile {
            label: "Relative Humidity",
            value_template: "{{value_json.relHumid}}",
            unit: "Percent RH",
            icon: "mdi:thermometer",
        },
    }
}

const WIFI_ATTRIBUTES_TEMPLATE: &str =
    "{\"ssid\": \"{{value_json.wifi.ssid}}\", \"ip\": \"{{value_json.wifi.ip}}\"}";

/// Build the discovery document for one sensor. Pure: identical inputs give
/// identical documents.
pub fn discovery_payload(
    kind: SensorKind,
    identity: &DeviceIdentity,
    topics: &TopicSet,
    device: &DeviceDescriptor,
) -> DiscoveryPayload {
    let profile = profile(kind);
    let id = identity.as_str();
    let (json_attributes_topic, json_attributes_template) = match kind {
        SensorKind::Wifi => (
            Some(topics.state.to_string()),
            Some(WIFI_ATTRIBUTES_TEMPLATE.to_string()),
        ),
        _ => (None, None),
    };

    DiscoveryPayload {
        device: device.clone(),
        availability_topic: topics.availability.to_string(),
        state_topic: topics.state.to_string(),
        name: format!("{id} {}", profile.label),
        value_template: profile.value_template.to_string(),
        unique_id: format!("{id}_{}", kind.suffix()),
        unit_of_measurement: profile.unit.to_string(),
        icon: profile.icon.to_string(),
        json_attributes_topic,
        json_attributes_template,
    }
}

/// A discovery document paired with its topic, ready for publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryMessage {
    pub kind: SensorKind,
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Serialize the discovery documents for every advertised sensor, each bound
/// to its own topic.
pub fn discovery_messages(
    identity: &DeviceIdentity,
    topics: &TopicSet,
    device: &DeviceDescriptor,
) -> Result<Vec<DiscoveryMessage>, serde_json::Error> {
    SensorKind::ALL
        .iter()
        .map(|&kind| {
            let payload = serde_json::to_vec(&discovery_payload(kind, identity, topics, device))?;
            Ok(DiscoveryMessage {
                kind,
                topic: topics.discovery(kind).to_string(),
                payload,
            })
        })
        .collect()
}
