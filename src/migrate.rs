//! Upgrades stored config entries to the current layout.
//!
//! Version history:
//! - 1: everything in `data` (`serial_port`, `time_open`, `time_close`).
//! - 2.1: durations moved to `options`, title is the serial port.
//! - 2.2: `address`, `device_type` and `inverted` added, unique id includes the
//!   address.
//! - 3: written by a release that was rolled back; same layout as 2.2.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{Error, Result};

pub const VERSION: u32 = 2;
pub const MINOR_VERSION: u32 = 2;

const DEFAULT_ADDRESS: &str = "aaeeee";
const DEFAULT_DEVICE_TYPE: &str = "projector_screen";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub version: u32,
    #[serde(default = "default_minor_version")]
    pub minor_version: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

fn default_minor_version() -> u32 {
    1
}

impl EntryRecord {
    pub fn is_current(&self) -> bool {
        (self.version, self.minor_version) == (VERSION, MINOR_VERSION)
    }
}

fn copy(from: &Map<String, Value>, key: &str, to: &mut Map<String, Value>) {
    if let Some(v) = from.get(key) {
        to.insert(key.to_string(), v.clone());
    }
}

fn serial_port(record: &EntryRecord) -> Result<String> {
    record
        .data
        .get("serial_port")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Migration("entry has no serial_port".to_string()))
}

fn v1_to_v2_1(record: EntryRecord) -> Result<EntryRecord> {
    debug!("Migrating config entry from 1 to 2");
    let port = serial_port(&record)?;

    let mut data = Map::new();
    copy(&record.data, "serial_port", &mut data);
    let mut options = Map::new();
    copy(&record.data, "time_open", &mut options);
    copy(&record.data, "time_close", &mut options);

    Ok(EntryRecord {
        version: 2,
        minor_version: 1,
        title: port,
        unique_id: record.unique_id,
        data,
        options,
    })
}

fn v2_1_to_v2_2(record: EntryRecord) -> Result<EntryRecord> {
    debug!("Migrating config entry from 2.1 to 2.2");
    let port = serial_port(&record)?;

    let mut data = Map::new();
    copy(&record.data, "serial_port", &mut data);
    data.insert("address".to_string(), Value::from(DEFAULT_ADDRESS));
    data.insert("device_type".to_string(), Value::from(DEFAULT_DEVICE_TYPE));

    let mut options = Map::new();
    copy(&record.options, "time_open", &mut options);
    copy(&record.options, "time_close", &mut options);
    let inverted = record.options.get("inverted").cloned().unwrap_or(Value::Bool(false));
    options.insert("inverted".to_string(), inverted);

    Ok(EntryRecord {
        version: 2,
        minor_version: 2,
        title: format!("{} {}", port, DEFAULT_ADDRESS.to_uppercase()),
        unique_id: Some(format!("{}-{}", port, DEFAULT_ADDRESS)),
        data,
        options,
    })
}

/// Brings `record` up to version 2.2. Entries from a newer release are refused.
pub fn migrate(mut record: EntryRecord) -> Result<EntryRecord> {
    if record.version > 3 {
        return Err(Error::Migration(format!(
            "version {} is newer than this release supports",
            record.version
        )));
    }

    if record.version == 3 {
        record.version = VERSION;
        record.minor_version = MINOR_VERSION;
    }
    if record.version == 1 {
        record = v1_to_v2_1(record)?;
    }
    if record.version == 2 && record.minor_version < 2 {
        record = v2_1_to_v2_2(record)?;
    }
    if !record.is_current() {
        return Err(Error::Migration(format!(
            "unknown version {}.{}",
            record.version, record.minor_version
        )));
    }

    debug!(
        "Migration to configuration version {}.{} successful",
        record.version, record.minor_version
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::{Config, DeviceType};
    use crate::frame::Address;

    fn record(value: Value) -> EntryRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn version_1_becomes_current() {
        let old = record(json!({
            "version": 1,
            "title": "XY Screens",
            "data": {"serial_port": "/dev/ttyUSB0", "time_open": 10, "time_close": 8}
        }));

        let new = migrate(old).unwrap();
        assert_eq!(
            new,
            record(json!({
                "version": 2,
                "minor_version": 2,
                "title": "/dev/ttyUSB0 AAEEEE",
                "unique_id": "/dev/ttyUSB0-aaeeee",
                "data": {
                    "serial_port": "/dev/ttyUSB0",
                    "address": "aaeeee",
                    "device_type": "projector_screen"
                },
                "options": {"time_open": 10, "time_close": 8, "inverted": false}
            }))
        );

        let config = Config::from_entry(&new).unwrap();
        assert_eq!(config.address, Address::DEFAULT);
        assert_eq!(config.device_type, DeviceType::ProjectorScreen);
        assert_eq!((config.time_open, config.time_close), (10, 8));
    }

    #[test]
    fn version_2_1_keeps_inverted() {
        let old = record(json!({
            "version": 2,
            "minor_version": 1,
            "title": "/dev/ttyUSB0",
            "data": {"serial_port": "/dev/ttyUSB0"},
            "options": {"time_open": 10, "time_close": 8, "inverted": true}
        }));
        let new = migrate(old).unwrap();
        assert_eq!(new.options.get("inverted"), Some(&Value::Bool(true)));
    }

    #[test]
    fn current_entry_is_untouched() {
        let current = record(json!({
            "version": 2,
            "minor_version": 2,
            "title": "/dev/ttyUSB0 EEEEEE",
            "unique_id": "/dev/ttyUSB0-eeeeee",
            "data": {
                "serial_port": "/dev/ttyUSB0",
                "address": "eeeeee",
                "device_type": "projector_lift"
            },
            "options": {"time_open": 10, "time_close": 8, "inverted": false}
        }));
        assert_eq!(migrate(current.clone()).unwrap(), current);
    }

    #[test]
    fn version_3_is_relabelled() {
        let mut entry = record(json!({
            "version": 3,
            "minor_version": 1,
            "title": "t",
            "data": {"serial_port": "/dev/ttyUSB0"}
        }));
        let new = migrate(entry.clone()).unwrap();
        entry.version = 2;
        entry.minor_version = 2;
        assert_eq!(new, entry);
    }

    #[test]
    fn future_version_is_refused() {
        let entry = record(json!({"version": 4, "data": {"serial_port": "/dev/ttyUSB0"}}));
        assert!(matches!(migrate(entry), Err(Error::Migration(_))));
    }

    #[test]
    fn missing_port_is_refused() {
        let entry = record(json!({"version": 1, "data": {"time_open": 1}}));
        assert!(matches!(migrate(entry), Err(Error::Migration(_))));
    }
}
