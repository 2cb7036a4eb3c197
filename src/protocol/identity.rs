//! Device identity derivation
//!
//! The identity is computed once at startup from the hardware-unique chip id
//! and never changes for the lifetime of the process. Every topic string and
//! discovery document is derived from it.

use heapless::String as BoundedString;
use std::fmt;
use std::fmt::Write as _;

/// Firmware name, used as the topic prefix and as the discovery model family
pub const FIRMWARE_PREFIX: &str = "aht10-env-sensor";

/// Prefix of the per-device identifier
pub const IDENTIFIER_PREFIX: &str = "AHT10";

/// Capacity of the identifier text in bytes
pub const IDENTIFIER_CAPACITY: usize = 24;

/// Chip ids are 24-bit on the reference hardware (lower half of the MAC)
const CHIP_ID_MASK: u32 = 0x00FF_FFFF;

/// Immutable device identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    chip_id: u32,
    identifier: BoundedString<IDENTIFIER_CAPACITY>,
}

impl DeviceIdentity {
    /// Hardware id the identity was derived from
    pub fn chip_id(&self) -> u32 {
        self.chip_id
    }

    /// Identifier string, e.g. `AHT10-1A2B3C`
    pub fn as_str(&self) -> &str {
        self.identifier.as_str()
    }

    /// Firmware name constant
    pub fn firmware(&self) -> &'static str {
        FIRMWARE_PREFIX
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the device identity from a hardware-unique integer.
///
/// The identifier is `AHT10-<hex>` with upper-case hex and no padding. The
/// widest possible value (`AHT10-FFFFFFFF`) fits the 24-byte capacity, so
/// this never truncates.
pub fn build_identity(hardware_id: u32) -> DeviceIdentity {
    let mut identifier = BoundedString::new();
    // 5 + 1 + 8 bytes at most
    let _ = write!(identifier, "{IDENTIFIER_PREFIX}-{hardware_id:X}");

    DeviceIdentity {
        chip_id: hardware_id,
        identifier,
    }
}

/// Derive a 24-bit chip id from a systemd/dbus machine id.
///
/// Uses the first eight hex digits, masked to the width of the reference
/// chip id. Returns `None` when the input does not start with hex digits.
pub fn chip_id_from_machine_id(machine_id: &str) -> Option<u32> {
    let trimmed = machine_id.trim();
    let head: std::string::String = trimmed.chars().take(8).collect();
    if head.is_empty() || !head.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    u32::from_str_radix(&head, 16)
        .ok()
        .map(|value| value & CHIP_ID_MASK)
}

/// Read the machine id from the usual locations and derive a chip id
pub fn read_host_chip_id() -> Option<u32> {
    ["/etc/machine-id", "/var/lib/dbus/machine-id"]
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .find_map(|content| chip_id_from_machine_id(&content))
}
