use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frame::Address;
use crate::migrate::EntryRecord;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    #[default]
    ProjectorScreen,
    ProjectorLift,
}

impl Display for DeviceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::ProjectorScreen => f.write_str("Projector Screen"),
            DeviceType::ProjectorLift => f.write_str("Projector Lift"),
        }
    }
}

/// Settings for one screen. Changing any of them means building a new screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub serial_port: String,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub device_type: DeviceType,
    /// Seconds for a full travel up.
    pub time_open: u32,
    /// Seconds for a full travel down.
    pub time_close: u32,
    #[serde(default)]
    pub inverted: bool,
    /// Controller reports its own state and position.
    #[serde(default)]
    pub feedback: bool,
}

impl Config {
    pub fn new(serial_port: impl Into<String>, time_open: u32, time_close: u32) -> Result<Self> {
        let config = Config {
            serial_port: serial_port.into(),
            address: Address::default(),
            device_type: DeviceType::default(),
            time_open,
            time_close,
            inverted: false,
            feedback: false,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_link()?;
        if self.time_open == 0 {
            return Err(Error::Configuration("time_open must be positive".to_string()));
        }
        if self.time_close == 0 {
            return Err(Error::Configuration("time_close must be positive".to_string()));
        }
        Ok(())
    }

    /// Checks only what is needed to talk to the device. Travel times matter
    /// to time-driven screens alone.
    pub fn validate_link(&self) -> Result<()> {
        if self.serial_port.trim().is_empty() {
            return Err(Error::Configuration("no serial port configured".to_string()));
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Builds the config stored in a (migrated) config entry.
    pub fn from_entry(entry: &EntryRecord) -> Result<Self> {
        let field = |key: &str| entry.data.get(key).or_else(|| entry.options.get(key));

        let serial_port = field("serial_port")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Configuration("entry has no serial_port".to_string()))?;
        let address = match field("address").and_then(Value::as_str) {
            Some(a) => a.parse()?,
            None => Address::default(),
        };
        let device_type = match field("device_type") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => DeviceType::default(),
        };
        let duration = |key: &str| -> Result<u32> {
            field(key)
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| Error::Configuration(format!("entry has no valid {}", key)))
        };

        let config = Config {
            serial_port: serial_port.to_string(),
            address,
            device_type,
            time_open: duration("time_open")?,
            time_close: duration("time_close")?,
            inverted: field("inverted").and_then(Value::as_bool).unwrap_or(false),
            feedback: field("feedback").and_then(Value::as_bool).unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn open_duration(&self) -> f64 {
        f64::from(self.time_open)
    }

    pub fn close_duration(&self) -> f64 {
        f64::from(self.time_close)
    }

    /// Display name, e.g. `/dev/ttyUSB0 AAEEEE`.
    pub fn title(&self) -> String {
        format!("{} {}", self.serial_port, self.address)
    }
}
