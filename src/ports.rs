use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use serialport::{available_ports, SerialPortType};
use tracing::debug;

use crate::{serial, Error, Result};

pub const BY_ID_DIR: &str = "/dev/serial/by-id";

/// A serial adapter present on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub device: String,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
}

impl Display for PortInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, s/n: {}",
            self.device,
            self.serial_number.as_deref().unwrap_or("n/a")
        )?;
        if let Some(manufacturer) = &self.manufacturer {
            write!(f, " - {}", manufacturer)?;
        }
        Ok(())
    }
}

pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = available_ports().map_err(|source| Error::Connection {
        port: "*".to_string(),
        source,
    })?;

    Ok(ports
        .into_iter()
        .map(|p| {
            let (serial_number, manufacturer) = match p.port_type {
                SerialPortType::UsbPort(usb) => (usb.serial_number, usb.manufacturer),
                _ => (None, None),
            };
            PortInfo {
                device: p.port_name,
                serial_number,
                manufacturer,
            }
        })
        .collect())
}

/// The stable `/dev/serial/by-id` name for `device`, or `device` itself.
pub fn serial_by_id(device: impl AsRef<Path>) -> PathBuf {
    serial_by_id_in(BY_ID_DIR, device)
}

pub fn serial_by_id_in(by_id: impl AsRef<Path>, device: impl AsRef<Path>) -> PathBuf {
    let device = device.as_ref();
    let target = fs::canonicalize(device).unwrap_or_else(|_| device.to_path_buf());

    let entries = match fs::read_dir(by_id) {
        Ok(entries) => entries,
        Err(_) => return device.to_path_buf(),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_link = fs::symlink_metadata(&path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if is_link && fs::canonicalize(&path).ok().as_deref() == Some(target.as_path()) {
            debug!("{} is {}", device.display(), path.display());
            return path;
        }
    }
    device.to_path_buf()
}

pub fn ensure_exists(device: &str) -> Result<()> {
    if Path::new(device).exists() {
        Ok(())
    } else {
        Err(Error::DeviceNotFound(device.to_string()))
    }
}

/// Opens and closes `device` with the screen's line settings.
pub fn probe(device: &str) -> Result<()> {
    let conn = serial::open(device)?;
    drop(conn);
    debug!("Device {} is available", device);
    Ok(())
}
