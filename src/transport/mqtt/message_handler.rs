//! Pure routing of rumqttc events

use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::Event;
use rumqttc::Outgoing;

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRoute {
    /// Broker accepted the session
    ConnectionAcknowledged,
    /// Message received on a subscribed topic
    MessageReceived {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    /// Broker closed the session
    Disconnected,
    /// A queued request reached the socket
    RequestWritten(Request),
    /// Keep-alive, acks and other bookkeeping
    InfrastructureEvent(String),
}

/// Client requests whose transmission the broker client waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Publish,
    Subscribe,
    Disconnect,
}

pub struct MessageHandler;

impl MessageHandler {
    /// Route an event from the rumqttc event loop
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: String::from_utf8_lossy(&publish.topic).into_owned(),
                    payload: publish.payload.to_vec(),
                    retain: publish.retain,
                },
                Packet::Disconnect(_) => EventRoute::Disconnected,
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(outgoing) => match outgoing {
                Outgoing::Publish(_) => EventRoute::RequestWritten(Request::Publish),
                Outgoing::Subscribe(_) => EventRoute::RequestWritten(Request::Subscribe),
                Outgoing::Disconnect => EventRoute::RequestWritten(Request::Disconnect),
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rumqttc::v5::mqttbytes::v5::{
        ConnAck, ConnectReturnCode, Disconnect, DisconnectReasonCode, Publish,
    };
    use rumqttc::v5::mqttbytes::QoS;

    #[test]
    fn test_route_connack() {
        let connack = Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
            properties: None,
        }));
        assert_eq!(
            MessageHandler::route_mqtt_event(&connack),
            EventRoute::ConnectionAcknowledged
        );
    }

    #[test]
    fn test_route_disconnect() {
        let disconnect = Event::Incoming(Packet::Disconnect(Disconnect {
            reason_code: DisconnectReasonCode::NormalDisconnection,
            properties: None,
        }));
        assert_eq!(
            MessageHandler::route_mqtt_event(&disconnect),
            EventRoute::Disconnected
        );
    }

    #[test]
    fn test_route_publish() {
        let publish = Event::Incoming(Packet::Publish(Publish {
            dup: false,
            qos: QoS::AtLeastOnce,
            retain: false,
            topic: Bytes::from("AHT10-ABC123/command"),
            pkid: 1,
            payload: Bytes::from("restart"),
            properties: None,
        }));

        assert_eq!(
            MessageHandler::route_mqtt_event(&publish),
            EventRoute::MessageReceived {
                topic: "AHT10-ABC123/command".to_string(),
                payload: b"restart".to_vec(),
                retain: false,
            }
        );
    }

    #[test]
    fn test_route_outgoing_requests() {
        assert_eq!(
            MessageHandler::route_mqtt_event(&Event::Outgoing(Outgoing::Publish(3))),
            EventRoute::RequestWritten(Request::Publish)
        );
        assert_eq!(
            MessageHandler::route_mqtt_event(&Event::Outgoing(Outgoing::Subscribe(4))),
            EventRoute::RequestWritten(Request::Subscribe)
        );
        assert!(matches!(
            MessageHandler::route_mqtt_event(&Event::Outgoing(Outgoing::PingReq)),
            EventRoute::InfrastructureEvent(_)
        ));
    }
}
