//! # Screenman
//! Drives XY Screens projector screens and lifts over an RS-232 link and keeps
//! track of where they are.
//!
//! Screens without feedback are estimated from elapsed time ([`screen`]),
//! screens that report back are followed frame by frame ([`feedback`]).

pub mod api;
pub mod clock;
pub mod config;
pub mod cover;
pub mod error;
pub mod feedback;
pub mod frame;
pub mod migrate;
pub mod ports;
pub mod screen;
pub mod serial;
pub mod updater;

pub use error::{Error, Result};
