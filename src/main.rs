//! AHT10 environment sensor - Main Entry Point
//!
//! Samples the sensor, publishes readings to MQTT and announces the device
//! to Home Assistant.

use clap::{Parser, Subcommand};
use envsensor::config::DeviceConfig;
use envsensor::debug::{DebugStream, TracingSink};
use envsensor::device::{ConnectivityManager, Device};
use envsensor::error::DeviceError;
use envsensor::lifecycle_span;
use envsensor::observability::init_default_logging;
use envsensor::platform::{DisabledUpdates, HwmonSensor, LinuxNetwork, SystemClock};
use envsensor::protocol::identity::read_host_chip_id;
use envsensor::protocol::{build_identity, build_topics, DeviceDescriptor, DeviceIdentity};
use envsensor::provisioning::{FilePortal, PersistedSettings};
use envsensor::transport::MqttBroker;
use std::path::{Path, PathBuf};
use std::process;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{error, info, warn, Instrument};

/// Pause between loop iterations
const IDLE: Duration = Duration::from_millis(10);

const HWMON_ROOT: &str = "/sys/class/hwmon";

/// AHT10 temperature/humidity telemetry daemon
#[derive(Parser)]
#[command(name = "aht10-env-sensor")]
#[command(about = "Publish AHT10 temperature and humidity readings over MQTT")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sampling and publishing loop
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Store the broker address and credentials
    Provision {
        /// Broker address: host, host:port or mqtt://host[:port]
        #[arg(long)]
        mqtt_server: String,
        #[arg(long, env = "MQTT_USERNAME")]
        username: Option<String>,
        #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Print the device identity and every topic it uses
    Topics,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting aht10-env-sensor v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_device(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
        Commands::Provision {
            mqtt_server,
            username,
            password,
        } => provision(&config, mqtt_server, username, password),
        Commands::Topics => print_topics(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(config_path: Option<&Path>) -> Result<DeviceConfig, DeviceError> {
    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => DeviceConfig::find_default(),
    };

    match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(DeviceConfig::load_from_file(&path)?)
        }
        None => {
            info!("No configuration file found, using defaults");
            Ok(DeviceConfig::default())
        }
    }
}

fn resolve_identity(config: &DeviceConfig) -> Result<DeviceIdentity, DeviceError> {
    let chip_id = config
        .device
        .chip_id
        .or_else(read_host_chip_id)
        .ok_or(DeviceError::MissingChipId)?;
    Ok(build_identity(chip_id))
}

fn open_sensor(config: &DeviceConfig) -> Result<HwmonSensor, DeviceError> {
    match &config.sensor.hwmon_path {
        Some(path) => Ok(HwmonSensor::new(path)),
        None => HwmonSensor::discover(Path::new(HWMON_ROOT)).ok_or(DeviceError::SensorNotFound),
    }
}

async fn run_device(config: DeviceConfig) -> Result<(), DeviceError> {
    config.require_mqtt_username()?;

    let identity = resolve_identity(&config)?;
    let sensor = open_sensor(&config)?;
    info!(identity = %identity, sensor = %sensor.dir().display(), "Device configured");

    let provisioning = FilePortal::open(
        &config.device.settings_path,
        identity.as_str(),
        config.portal_timeout(),
    )?;
    let device_descriptor =
        DeviceDescriptor::new(&identity, &config.device.model, &config.device.sw_version);

    let manager = ConnectivityManager::new(
        MqttBroker::new(),
        provisioning,
        identity.clone(),
        device_descriptor,
        config.session_options(),
        config.reconnect_policy(),
    );

    let mut device = Device::new(
        DebugStream::with_sink(Box::new(TracingSink::new())),
        manager,
        sensor,
        Box::new(LinuxNetwork::new(
            config.network.interface.clone(),
            config.network.ssid.clone(),
        )),
        Box::new(DisabledUpdates::new()),
        Box::new(SystemClock::new()),
        config.device_timing(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
        }
        let _ = shutdown_tx.send(true);
    });

    let span = lifecycle_span!(identity = %identity);
    async {
        device.startup().await;
        device.run(shutdown_rx, IDLE).await;
    }
    .instrument(span)
    .await;

    info!("Device shutdown complete");
    Ok(())
}

fn handle_config_command(config: &DeviceConfig, show: bool) -> Result<(), DeviceError> {
    config.validate()?;
    if show {
        println!("{}", config.to_toml()?);
    } else {
        println!("Configuration is valid");
    }
    if config.get_mqtt_username().is_none() && config.mqtt.username_env.is_some() {
        warn!("Broker username variable is named but not set");
    }
    Ok(())
}

fn provision(
    config: &DeviceConfig,
    mqtt_server: String,
    username: Option<String>,
    password: Option<String>,
) -> Result<(), DeviceError> {
    let mut portal = FilePortal::open(
        &config.device.settings_path,
        "cli",
        config.portal_timeout(),
    )?;
    let settings = PersistedSettings {
        mqtt_server,
        username,
        password,
    };

    let mut debug = DebugStream::with_sink(Box::new(TracingSink::new()));
    portal.save(settings, &mut debug)?;
    println!("Saved broker settings to {}", portal.path().display());
    Ok(())
}

fn print_topics(config: &DeviceConfig) -> Result<(), DeviceError> {
    let identity = resolve_identity(config)?;
    println!("Identity: {identity}");
    for topic in build_topics(&identity).iter() {
        println!("{topic}");
    }
    Ok(())
}
