//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.
//! We test observable outcomes, not implementation details of TOML parsing.

use envsensor::config::{ConfigError, DeviceConfig};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[device]
chip_id = 1715004
settings_path = "/var/lib/aht10/config.json"
portal_timeout_secs = 60

[mqtt]
port = 8883
keep_alive_secs = 30

[timing]
publish_interval_ms = 15000
reconnect_interval_ms = 120000
"#
    )
    .unwrap();

    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.device.chip_id, Some(0x1A2B3C));
    assert_eq!(
        config.device.settings_path,
        PathBuf::from("/var/lib/aht10/config.json")
    );
    assert_eq!(config.portal_timeout(), Duration::from_secs(60));

    let session = config.session_options();
    assert_eq!(session.port, 8883);
    assert_eq!(session.keep_alive, Duration::from_secs(30));
    assert_eq!(session.max_packet_size, 2048);

    let timing = config.device_timing();
    assert_eq!(timing.publish_interval_ms, 15_000);
    assert_eq!(timing.reconnect_interval_ms, 120_000);
}

#[test]
fn test_config_empty_file_gives_defaults() {
    let temp_file = NamedTempFile::new().unwrap();

    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config, DeviceConfig::default());
    assert_eq!(config.reconnect_policy().max_attempts, 10);
    assert_eq!(
        config.reconnect_policy().retry_delay,
        Duration::from_secs(3)
    );
}

#[test]
fn test_config_file_not_found() {
    let result = DeviceConfig::load_from_file(std::path::Path::new("/nonexistent/sensor.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_config_invalid_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[mqtt\nport = ").unwrap();

    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_wrong_type_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[mqtt]\nport = \"eighteen\"").unwrap();

    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_validation_rejects_zero_values() {
    let cases = [
        "[timing]\npublish_interval_ms = 0",
        "[timing]\nreconnect_interval_ms = 0",
        "[timing]\nmax_attempts = 0",
        "[mqtt]\nkeep_alive_secs = 0",
        "[mqtt]\nmax_packet_size = 0",
        "[mqtt]\nport = 0",
    ];

    for case in cases {
        let result = DeviceConfig::from_toml(case);
        assert!(
            matches!(result, Err(ConfigError::InvalidConfig(_))),
            "expected rejection for {case:?}"
        );
    }
}

#[test]
fn test_config_validation_rejects_blank_model() {
    let result = DeviceConfig::from_toml("[device]\nmodel = \"  \"");
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_config_credentials_come_from_environment() {
    std::env::set_var("AHT10_TEST_CONFIG_USER", "sensor");
    let config = DeviceConfig::from_toml(
        "[mqtt]\nusername_env = \"AHT10_TEST_CONFIG_USER\"\npassword_env = \"AHT10_TEST_CONFIG_PASS_UNSET\"",
    )
    .unwrap();

    assert_eq!(config.get_mqtt_username().as_deref(), Some("sensor"));
    assert_eq!(config.get_mqtt_password(), None);
    assert_eq!(
        config.require_mqtt_username().unwrap().as_deref(),
        Some("sensor")
    );

    let session = config.session_options();
    assert_eq!(session.username.as_deref(), Some("sensor"));
    assert_eq!(session.password, None);
    std::env::remove_var("AHT10_TEST_CONFIG_USER");
}

#[test]
fn test_config_show_output_reloads() {
    let mut config = DeviceConfig::default();
    config.device.chip_id = Some(42);
    config.sensor.hwmon_path = Some(PathBuf::from("/sys/class/hwmon/hwmon3"));

    let rendered = config.to_toml().unwrap();
    assert!(rendered.contains("[timing]"));

    let reloaded = DeviceConfig::from_toml(&rendered).unwrap();
    assert_eq!(reloaded, config);
}
