//! Network status for the state document

use crate::protocol::NetworkStatus;
use std::fs;
use std::net::UdpSocket;

/// Source of SSID, local address and signal strength
pub trait NetworkInfo: Send {
    fn status(&self) -> NetworkStatus;
}

const WIRELESS_STATS: &str = "/proc/net/wireless";

/// Signal level reported for an interface in `/proc/net/wireless` contents
///
/// Data lines look like `wlan0: 0000   54.  -56.  -256  ...`; the level is
/// the third column after the interface name.
pub fn parse_wireless_level(contents: &str, interface: &str) -> Option<i32> {
    contents.lines().find_map(|line| {
        let (name, rest) = line.trim_start().split_once(':')?;
        if name != interface {
            return None;
        }
        let level = rest.split_whitespace().nth(2)?;
        let level = level.trim_end_matches('.');
        level.parse::<f32>().ok().map(|value| value as i32)
    })
}

/// Linux host network status
#[derive(Debug, Clone)]
pub struct LinuxNetwork {
    interface: String,
    ssid: String,
}

impl LinuxNetwork {
    pub fn new(interface: impl Into<String>, ssid: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            ssid: ssid.into(),
        }
    }

    fn rssi(&self) -> i32 {
        fs::read_to_string(WIRELESS_STATS)
            .ok()
            .and_then(|contents| parse_wireless_level(&contents, &self.interface))
            .unwrap_or(0)
    }

    /// Address the kernel would use for outbound traffic. Connecting a UDP
    /// socket sends nothing.
    fn local_ip(&self) -> String {
        UdpSocket::bind("0.0.0.0:0")
            .and_then(|socket| {
                socket.connect("192.0.2.1:9")?;
                socket.local_addr()
            })
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|_| "0.0.0.0".to_string())
    }
}

impl NetworkInfo for LinuxNetwork {
    fn status(&self) -> NetworkStatus {
        NetworkStatus {
            ssid: self.ssid.clone(),
            ip: self.local_ip(),
            rssi: self.rssi(),
        }
    }
}
