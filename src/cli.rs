use std::path::PathBuf;

use clap::{Parser, Subcommand};
use git_version::git_version;

use screenman::config::{Config, DeviceType};
use screenman::frame::Address;
use screenman::{Error, Result};

const GIT_VERSION: &str = git_version!(fallback = "unknown");

/// Serial controller for XY Screens projector screens and lifts.
#[derive(Parser)]
#[clap(name = "Screenman", version = GIT_VERSION)]
pub struct Opts {
    /// TOML file with the screen settings, instead of the flags below
    #[clap(long)]
    pub config: Option<PathBuf>,

    #[clap(long)]
    pub port: Option<String>,

    #[clap(long, default_value = "AAEEEE")]
    pub address: Address,

    /// Seconds for a full travel up
    #[clap(long, default_value = "0")]
    pub time_open: u32,

    /// Seconds for a full travel down
    #[clap(long, default_value = "0")]
    pub time_close: u32,

    #[clap(long)]
    pub inverted: bool,

    /// The controller reports its own position
    #[clap(long)]
    pub feedback: bool,

    /// Last known position, used as the starting point
    #[clap(long, default_value = "100")]
    pub at: f64,

    #[clap(long, default_value = "info")]
    pub log_level: String,

    #[clap(subcommand)]
    pub action: Action,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// List serial adapters
    Ports,
    /// Check that the port can be opened
    Probe,
    Open,
    Close,
    Stop,
    /// Move to a position, 0 closed and 100 open
    Position { pct: u8 },
    /// Follow a screen with feedback until Ctrl+C; other screens print their
    /// estimate once
    Watch,
}

impl Opts {
    pub fn screen_config(&self) -> Result<Config> {
        if let Some(path) = &self.config {
            return Config::load(path);
        }

        let port = self
            .port
            .clone()
            .ok_or_else(|| Error::Configuration("--port or --config is required".to_string()))?;
        let config = Config {
            serial_port: port,
            address: self.address,
            device_type: DeviceType::default(),
            time_open: self.time_open,
            time_close: self.time_close,
            inverted: self.inverted,
            feedback: self.feedback,
        };
        if self.needs_travel_times() {
            config.validate()?;
        } else {
            config.validate_link()?;
        }
        Ok(config)
    }

    fn needs_travel_times(&self) -> bool {
        !self.feedback && !matches!(self.action, Action::Ports | Action::Probe)
    }
}
