//! Topic construction for the availability, state, command and discovery channels
//!
//! All topics are bounded text. Rendering never overflows: anything past the
//! capacity is dropped at a character boundary.

use super::identity::{DeviceIdentity, FIRMWARE_PREFIX};
use heapless::String as BoundedString;
use std::fmt;

/// Capacity of every topic buffer in bytes
pub const TOPIC_CAPACITY: usize = 128;

/// Home Assistant discovery prefix
pub const DISCOVERY_PREFIX: &str = "homeassistant";

/// Bounded topic text
pub type Topic = BoundedString<TOPIC_CAPACITY>;

/// Sensors announced through discovery, in publication order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Network signal strength (with SSID/IP as attributes)
    Wifi,
    /// Particulate matter; advertised for compatibility with existing dashboards
    Pm25,
    /// Temperature in degrees Celsius
    Temperature,
    /// Relative humidity
    Humidity,
}

impl SensorKind {
    pub const ALL: [SensorKind; 4] = [
        SensorKind::Wifi,
        SensorKind::Pm25,
        SensorKind::Temperature,
        SensorKind::Humidity,
    ];

    /// Suffix appended to the identity in unique ids and discovery topics
    pub fn suffix(self) -> &'static str {
        match self {
            SensorKind::Wifi => "wifi",
            SensorKind::Pm25 => "pm25",
            SensorKind::Temperature => "degC",
            SensorKind::Humidity => "relHumid",
        }
    }

    fn index(self) -> usize {
        match self {
            SensorKind::Wifi => 0,
            SensorKind::Pm25 => 1,
            SensorKind::Temperature => 2,
            SensorKind::Humidity => 3,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Writer that fills a bounded string and silently drops what does not fit
struct Truncating<'a, const N: usize> {
    out: &'a mut BoundedString<N>,
    truncated: bool,
}

impl<const N: usize> fmt::Write for Truncating<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Once cut, later pieces are dropped so the result stays a prefix
        if self.truncated {
            return Ok(());
        }
        for c in s.chars() {
            if self.out.push(c).is_err() {
                self.truncated = true;
                break;
            }
        }
        Ok(())
    }
}

/// Render formatted text into a bounded string, truncating on overflow.
///
/// Returns the text and whether anything was cut.
pub fn render_bounded<const N: usize>(args: fmt::Arguments<'_>) -> (BoundedString<N>, bool) {
    let mut out = BoundedString::new();
    let mut writer = Truncating {
        out: &mut out,
        truncated: false,
    };
    let _ = fmt::write(&mut writer, args);
    let truncated = writer.truncated;
    (out, truncated)
}

fn render_topic(args: fmt::Arguments<'_>) -> Topic {
    let (topic, truncated) = render_bounded::<TOPIC_CAPACITY>(args);
    if truncated {
        tracing::warn!(topic = %topic, "Topic truncated to {} bytes", TOPIC_CAPACITY);
    }
    topic
}

/// Every topic the lifecycle uses, fixed for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    pub availability: Topic,
    pub state: Topic,
    pub command: Topic,
    discovery: [Topic; 4],
}

impl TopicSet {
    /// Discovery topic for the given sensor
    pub fn discovery(&self, kind: SensorKind) -> &str {
        self.discovery[kind.index()].as_str()
    }

    /// All topics, lifecycle channels first then discovery in publication order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [&self.availability, &self.state, &self.command]
            .into_iter()
            .chain(self.discovery.iter())
            .map(|topic| topic.as_str())
    }
}

/// Build the topic set for a device identity
pub fn build_topics(identity: &DeviceIdentity) -> TopicSet {
    let id = identity.as_str();
    let discovery = SensorKind::ALL.map(|kind| {
        render_topic(format_args!(
            "{DISCOVERY_PREFIX}/sensor/{FIRMWARE_PREFIX}/{id}_{}/config",
            kind.suffix()
        ))
    });

    TopicSet {
        availability: render_topic(format_args!("{FIRMWARE_PREFIX}/{id}/status")),
        state: render_topic(format_args!("{FIRMWARE_PREFIX}/{id}/state")),
        command: render_topic(format_args!("{FIRMWARE_PREFIX}/{id}/command")),
        discovery,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::identity::build_identity;

    #[test]
    fn test_topic_construction() {
        let topics = build_topics(&build_identity(0xABC));
        assert_eq!(topics.availability.as_str(), "aht10-env-sensor/AHT10-ABC/status");
        assert_eq!(topics.state.as_str(), "aht10-env-sensor/AHT10-ABC/state");
        assert_eq!(topics.command.as_str(), "aht10-env-sensor/AHT10-ABC/command");
        assert_eq!(
            topics.discovery(SensorKind::Wifi),
            "homeassistant/sensor/aht10-env-sensor/AHT10-ABC_wifi/config"
        );
        assert_eq!(
            topics.discovery(SensorKind::Pm25),
            "homeassistant/sensor/aht10-env-sensor/AHT10-ABC_pm25/config"
        );
        assert_eq!(
            topics.discovery(SensorKind::Temperature),
            "homeassistant/sensor/aht10-env-sensor/AHT10-ABC_degC/config"
        );
        assert_eq!(
            topics.discovery(SensorKind::Humidity),
            "homeassistant/sensor/aht10-env-sensor/AHT10-ABC_relHumid/config"
        );
    }

    #[test]
    fn test_discovery_topics_are_distinct() {
        let topics = build_topics(&build_identity(7));
        let mut seen: Vec<&str> = SensorKind::ALL
            .iter()
            .map(|kind| topics.discovery(*kind))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_render_bounded_truncates_at_char_boundary() {
        let (text, truncated) = render_bounded::<4>(format_args!("ab{}", "çd"));
        assert!(truncated);
        assert_eq!(text.as_str(), "abç");

        let (wide, narrow) = ("ç", "d");
        let (text, truncated) = render_bounded::<4>(format_args!("abc{}{}", wide, narrow));
        assert!(truncated);
        assert_eq!(text.as_str(), "abc");

        let (text, truncated) = render_bounded::<8>(format_args!("{}", "short"));
        assert!(!truncated);
        assert_eq!(text.as_str(), "short");
    }

    #[test]
    fn test_topic_iter_order() {
        let topics = build_topics(&build_identity(1));
        let all: Vec<&str> = topics.iter().collect();
        assert_eq!(all.len(), 7);
        assert_eq!(all[0], topics.availability.as_str());
        assert_eq!(all[3], topics.discovery(SensorKind::Wifi));
        assert_eq!(all[6], topics.discovery(SensorKind::Humidity));
    }
}
