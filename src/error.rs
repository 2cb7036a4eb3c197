//! Top-level error type for the daemon

use thiserror::Error;

/// Anything that stops the daemon from starting or a command from completing.
///
/// Runtime faults inside the main loop (connect failures, sensor errors,
/// publish failures) are handled where they occur and never reach this type.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Provisioning error: {0}")]
    Provisioning(#[from] crate::provisioning::ProvisioningError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] crate::platform::SensorError),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::mqtt::MqttError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No hardware id: set device.chip_id or provide /etc/machine-id")]
    MissingChipId,

    #[error("No AHT10 hwmon device found; set sensor.hwmon_path")]
    SensorNotFound,
}
