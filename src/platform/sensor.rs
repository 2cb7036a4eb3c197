//! Temperature/humidity sensor driver
//!
//! On the host the AHT10 is bound to the kernel `aht10` hwmon driver, which
//! exposes `temp1_input` (millidegrees Celsius) and `humidity1_input`
//! (milli-percent RH).

use crate::protocol::SensorReading;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Sensor not started")]
    NotStarted,
    #[error("Sensor unavailable: {0}")]
    Unavailable(String),
    #[error("Failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unexpected value {value:?} in {path}")]
    Parse { path: PathBuf, value: String },
}

/// Blocking sensor interface
pub trait SensorDriver: Send {
    /// Initialise the sensor
    fn begin(&mut self) -> Result<(), SensorError>;

    /// Take a measurement; the values are read back with the accessors
    fn read_raw_data(&mut self) -> Result<(), SensorError>;

    /// Temperature from the last measurement, in degrees Celsius
    fn read_temperature(&self) -> f32;

    /// Relative humidity from the last measurement, in percent
    fn read_humidity(&self) -> f32;

    /// Take a measurement and return it as a reading
    fn sample(&mut self) -> Result<SensorReading, SensorError> {
        self.read_raw_data()?;
        Ok(SensorReading {
            temperature_celsius: self.read_temperature(),
            relative_humidity_percent: self.read_humidity(),
        })
    }
}

const TEMPERATURE_FILE: &str = "temp1_input";
const HUMIDITY_FILE: &str = "humidity1_input";
const HWMON_NAME: &str = "aht10";

/// AHT10 read through a hwmon directory
#[derive(Debug)]
pub struct HwmonSensor {
    dir: PathBuf,
    started: bool,
    temperature: f32,
    humidity: f32,
}

impl HwmonSensor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            started: false,
            temperature: 0.0,
            humidity: 0.0,
        }
    }

    /// Find the first hwmon device named `aht10` under `root`
    /// (normally `/sys/class/hwmon`)
    pub fn discover(root: &Path) -> Option<Self> {
        let entries = fs::read_dir(root).ok()?;
        entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .find(|path| {
                fs::read_to_string(path.join("name"))
                    .map(|name| name.trim() == HWMON_NAME)
                    .unwrap_or(false)
            })
            .map(Self::new)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_milli(&self, file: &str) -> Result<f32, SensorError> {
        let path = self.dir.join(file);
        let raw = fs::read_to_string(&path).map_err(|source| SensorError::Io {
            path: path.clone(),
            source,
        })?;
        let value: i64 = raw.trim().parse().map_err(|_| SensorError::Parse {
            path: path.clone(),
            value: raw.trim().to_string(),
        })?;
        Ok(value as f32 / 1000.0)
    }
}

impl SensorDriver for HwmonSensor {
    fn begin(&mut self) -> Result<(), SensorError> {
        let temperature_file = self.dir.join(TEMPERATURE_FILE);
        if !temperature_file.exists() {
            return Err(SensorError::Unavailable(format!(
                "{} does not exist",
                temperature_file.display()
            )));
        }
        debug!(dir = %self.dir.display(), "Sensor started");
        self.started = true;
        Ok(())
    }

    fn read_raw_data(&mut self) -> Result<(), SensorError> {
        if !self.started {
            return Err(SensorError::NotStarted);
        }
        let temperature = self.read_milli(TEMPERATURE_FILE)?;
        let humidity = self.read_milli(HUMIDITY_FILE)?;
        self.temperature = temperature;
        self.humidity = humidity;
        Ok(())
    }

    fn read_temperature(&self) -> f32 {
        self.temperature
    }

    fn read_humidity(&self) -> f32 {
        self.humidity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hwmon_dir(temperature: &str, humidity: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("name"), "aht10\n").unwrap();
        fs::write(dir.path().join(TEMPERATURE_FILE), temperature).unwrap();
        fs::write(dir.path().join(HUMIDITY_FILE), humidity).unwrap();
        dir
    }

    #[test]
    fn test_sample_converts_milli_units() {
        let dir = hwmon_dir("21500\n", "47200\n");
        let mut sensor = HwmonSensor::new(dir.path());
        sensor.begin().unwrap();

        let reading = sensor.sample().unwrap();
        assert!((reading.temperature_celsius - 21.5).abs() < 1e-4);
        assert!((reading.relative_humidity_percent - 47.2).abs() < 1e-4);
    }

    #[test]
    fn test_read_before_begin_fails() {
        let dir = hwmon_dir("1", "1");
        let mut sensor = HwmonSensor::new(dir.path());
        assert!(matches!(sensor.read_raw_data(), Err(SensorError::NotStarted)));
    }

    #[test]
    fn test_begin_fails_without_device() {
        let dir = TempDir::new().unwrap();
        let mut sensor = HwmonSensor::new(dir.path());
        assert!(matches!(sensor.begin(), Err(SensorError::Unavailable(_))));
    }

    #[test]
    fn test_garbage_value_is_parse_error() {
        let dir = hwmon_dir("21500", "n/a");
        let mut sensor = HwmonSensor::new(dir.path());
        sensor.begin().unwrap();
        assert!(matches!(sensor.sample(), Err(SensorError::Parse { .. })));
    }

    #[test]
    fn test_discover_by_name() {
        let root = TempDir::new().unwrap();
        let other = root.path().join("hwmon0");
        fs::create_dir(&other).unwrap();
        fs::write(other.join("name"), "coretemp\n").unwrap();
        let aht = root.path().join("hwmon1");
        fs::create_dir(&aht).unwrap();
        fs::write(aht.join("name"), "aht10\n").unwrap();

        let sensor = HwmonSensor::discover(root.path()).unwrap();
        assert_eq!(sensor.dir(), aht.as_path());
    }
}
