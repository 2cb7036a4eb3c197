//! Pure connection configuration for the MQTT client
//!
//! Turns [`ConnectOptions`] into rumqttc options and parses the provisioned
//! broker address. Nothing here touches the network.

use crate::transport::ConnectOptions;
use rumqttc::v5::mqttbytes::v5::LastWill;
use rumqttc::v5::{mqttbytes::QoS, MqttOptions};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Invalid broker address: {0:?}")]
    InvalidBrokerUrl(String),
    #[error("Unsupported broker scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Connection failed")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("No connection acknowledgement within {0:?}")]
    ConnAckTimeout(Duration),
    #[error("Connection lost")]
    ConnectionLost(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Subscription failed")]
    SubscriptionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Request not written to the broker within {0:?}")]
    FlushTimeout(Duration),
    #[error("Not connected")]
    NotConnected,
}

/// Split a provisioned broker address into host and port.
///
/// Accepts `host`, `host:port`, `mqtt://host` and `mqtt://host:port`.
/// `default_port` applies when no port is given.
pub fn parse_broker_address(server: &str, default_port: u16) -> Result<(String, u16), MqttError> {
    let server = server.trim();
    if server.is_empty() {
        return Err(MqttError::InvalidBrokerUrl(server.to_string()));
    }

    let candidate = if server.contains("://") {
        server.to_string()
    } else {
        format!("mqtt://{server}")
    };
    let url =
        Url::parse(&candidate).map_err(|_| MqttError::InvalidBrokerUrl(server.to_string()))?;

    match url.scheme() {
        "mqtt" | "tcp" => {}
        other => return Err(MqttError::UnsupportedScheme(other.to_string())),
    }

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| MqttError::InvalidBrokerUrl(server.to_string()))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = url.port().unwrap_or(default_port);

    Ok((host.to_string(), port))
}

/// Build rumqttc options for one connection attempt
pub fn configure_mqtt_options(options: &ConnectOptions) -> Result<MqttOptions, MqttError> {
    let (host, port) = parse_broker_address(&options.server, options.port)?;

    let mut mqtt_options = MqttOptions::new(options.client_id.clone(), host, port);
    mqtt_options.set_keep_alive(options.keep_alive);
    mqtt_options.set_max_packet_size(Some(options.max_packet_size));

    if let Some(username) = &options.username {
        let password = options.password.clone().unwrap_or_default();
        mqtt_options.set_credentials(username.clone(), password);
    }

    // Retained at-least-once so late subscribers also see the device as gone
    let will = LastWill::new(
        options.will.topic.clone(),
        options.will.payload.clone(),
        QoS::AtLeastOnce,
        options.will.retain,
        None,
    );
    mqtt_options.set_last_will(will);

    Ok(mqtt_options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::WillMessage;

    fn test_options(server: &str) -> ConnectOptions {
        ConnectOptions {
            server: server.to_string(),
            port: 1883,
            client_id: "AHT10-ABC123".to_string(),
            username: None,
            password: None,
            will: WillMessage {
                topic: "AHT10-ABC123/availability".to_string(),
                payload: b"offline".to_vec(),
                retain: true,
            },
            keep_alive: Duration::from_secs(10),
            max_packet_size: 2048,
        }
    }

    #[test]
    fn test_parse_bare_host() {
        let (host, port) = parse_broker_address("broker.local", 1883).unwrap();
        assert_eq!(host, "broker.local");
        assert_eq!(port, 1883);
    }

    #[test]
    fn test_parse_host_with_port() {
        let (host, port) = parse_broker_address("192.168.1.20:1884", 1883).unwrap();
        assert_eq!(host, "192.168.1.20");
        assert_eq!(port, 1884);
    }

    #[test]
    fn test_parse_url_forms() {
        assert_eq!(
            parse_broker_address("mqtt://broker.local:8884", 1883).unwrap(),
            ("broker.local".to_string(), 8884)
        );
        assert_eq!(
            parse_broker_address("  mqtt://broker.local  ", 1883).unwrap(),
            ("broker.local".to_string(), 1883)
        );
    }

    #[test]
    fn test_parse_rejects_bad_addresses() {
        assert!(matches!(
            parse_broker_address("", 1883),
            Err(MqttError::InvalidBrokerUrl(_))
        ));
        assert!(matches!(
            parse_broker_address("http://broker.local", 1883),
            Err(MqttError::UnsupportedScheme(scheme)) if scheme == "http"
        ));
    }

    #[test]
    fn test_configure_mqtt_options() {
        let mut options = test_options("broker.local:1990");
        options.username = Some("sensor".to_string());
        options.password = Some("secret".to_string());

        let mqtt_options = configure_mqtt_options(&options).unwrap();
        assert_eq!(
            mqtt_options.broker_address(),
            ("broker.local".to_string(), 1990)
        );
        assert_eq!(mqtt_options.client_id(), "AHT10-ABC123");
        assert_eq!(mqtt_options.keep_alive(), Duration::from_secs(10));

        let will = mqtt_options.last_will().expect("will configured");
        assert_eq!(will.topic, "AHT10-ABC123/availability");
        assert_eq!(&will.message[..], b"offline");
        assert!(will.retain);
    }

    #[test]
    fn test_configure_rejects_empty_server() {
        let options = test_options("");
        assert!(matches!(
            configure_mqtt_options(&options),
            Err(MqttError::InvalidBrokerUrl(_))
        ));
    }

    #[test]
    fn test_mqtt_error_display() {
        let errors = vec![
            MqttError::InvalidBrokerUrl("x".to_string()),
            MqttError::UnsupportedScheme("http".to_string()),
            MqttError::ConnectionFailed("refused".to_string().into()),
            MqttError::ConnAckTimeout(Duration::from_secs(5)),
            MqttError::PublishFailed("full".to_string().into()),
            MqttError::NotConnected,
        ];
        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
