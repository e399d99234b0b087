use core::result;
use std::io;

use thiserror::Error;

pub type Result<T> = result::Result<T, Error>;

/// An Error that can occur in this crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Device {0} does not exist")]
    DeviceNotFound(String),

    #[error("Unable to connect to device {port}: {source}")]
    Connection {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Error while writing device {port}: {source}")]
    Write {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("Error while reading device {port}: {source}")]
    Read {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("Reader thread error: {0}")]
    ReaderThread(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors that leave the device unreachable rather than misconfigured.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Error::DeviceNotFound(_)
                | Error::Connection { .. }
                | Error::Write { .. }
                | Error::Read { .. }
        )
    }
}
