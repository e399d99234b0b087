//! Time-driven position estimation.
//!
//! Screens without feedback never report where they are. The position is
//! reconstructed from when the last motion command went out and how long a
//! full travel takes in each direction.

use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::api::{Command, MotionState, Update};
use crate::clock::Clock;
use crate::frame::{Address, Frame};
use crate::serial::Transport;
use crate::Result;

/// Estimator state for one screen. Positions are fractions, 0.0 closed and
/// 1.0 open; every operation takes the current time explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenModel {
    fraction: f64,
    state: MotionState,
    command_timestamp: f64,
    open_duration: f64,
    close_duration: f64,
    target: Option<f64>,
}

impl ScreenModel {
    /// A fully open screen. Durations are seconds and must be positive.
    pub fn new(open_duration: f64, close_duration: f64) -> Self {
        Self {
            fraction: 1.0,
            state: MotionState::Up,
            command_timestamp: 0.0,
            open_duration,
            close_duration,
            target: None,
        }
    }

    pub fn with_position(mut self, position: f64) -> Self {
        self.restore(position);
        self
    }

    /// Puts the screen at rest at `position` percent.
    pub fn restore(&mut self, position: f64) {
        let position = position.clamp(0.0, 100.0);
        self.fraction = position / 100.0;
        self.state = MotionState::at_rest(position);
        self.target = None;
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn command_timestamp(&self) -> f64 {
        self.command_timestamp
    }

    /// Pending stop-at target as a fraction.
    pub fn target(&self) -> Option<f64> {
        self.target
    }

    /// Brings the model up to `now`, moving to `Up` or `Down` once travel is
    /// complete.
    pub fn update(&mut self, now: f64) {
        match self.state {
            MotionState::Upward => {
                let fraction =
                    ((now - self.command_timestamp) / self.open_duration).clamp(0.0, 1.0);
                self.fraction = fraction;
                if fraction >= 1.0 {
                    self.state = MotionState::Up;
                    self.target = None;
                }
            }
            MotionState::Downward => {
                let fraction =
                    (1.0 - (now - self.command_timestamp) / self.close_duration).clamp(0.0, 1.0);
                self.fraction = fraction;
                if fraction <= 0.0 {
                    self.state = MotionState::Down;
                    self.target = None;
                }
            }
            MotionState::Up | MotionState::Stopped | MotionState::Down => {}
        }
    }

    pub fn fraction(&mut self, now: f64) -> f64 {
        self.update(now);
        self.fraction
    }

    /// Position in percent at `now`.
    pub fn position(&mut self, now: f64) -> f64 {
        self.fraction(now) * 100.0
    }

    /// Starts travelling up. The timestamp is moved back so that the position
    /// at `now` is unchanged.
    pub fn start_opening(&mut self, now: f64) {
        self.update(now);
        self.command_timestamp = now - self.fraction * self.open_duration;
        self.state = MotionState::Upward;
        self.target = None;
    }

    pub fn start_closing(&mut self, now: f64) {
        self.update(now);
        self.command_timestamp = now - (1.0 - self.fraction) * self.close_duration;
        self.state = MotionState::Downward;
        self.target = None;
    }

    /// Freezes the position computed for `now`.
    pub fn halt(&mut self, now: f64) {
        self.update(now);
        self.state = MotionState::Stopped;
        self.target = None;
    }

    pub fn set_target(&mut self, fraction: f64) {
        self.target = Some(fraction.clamp(0.0, 1.0));
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    /// Whether travel has reached or passed the pending target.
    pub fn target_reached(&self) -> bool {
        match (self.state, self.target) {
            (MotionState::Upward, Some(t)) => self.fraction >= t,
            (MotionState::Downward, Some(t)) => self.fraction <= t,
            _ => false,
        }
    }
}

/// A screen without feedback: estimator plus the link its commands go out on.
pub struct Screen {
    model: ScreenModel,
    address: Address,
    transport: Box<dyn Transport>,
    clock: Arc<dyn Clock>,
    available: bool,
}

impl Screen {
    pub fn new(
        model: ScreenModel,
        address: Address,
        transport: Box<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            model,
            address,
            transport,
            clock,
            available: true,
        }
    }

    pub fn model(&self) -> &ScreenModel {
        &self.model
    }

    /// False when the last command could not reach the device.
    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn restore_position(&mut self, position: f64) {
        debug!("Last screen position: {:5.1} %", position);
        self.model.restore(position);
    }

    /// Recomputes position and state, sending the stop for a position target
    /// once it has been reached.
    pub fn refresh(&mut self) -> Update {
        let now = self.clock.now();
        self.model.update(now);

        if self.model.target_reached() {
            match self.send(Command::Stop) {
                Ok(()) => self.model.halt(now),
                Err(e) => {
                    warn!("Unable to stop at target position: {}", e);
                    self.model.clear_target();
                }
            }
        }

        let update = Update {
            state: self.model.state(),
            position: self.model.position(now),
        };
        trace!("Screen position: {}", update);
        update
    }

    pub fn position(&mut self) -> f64 {
        self.refresh().position
    }

    pub fn state(&mut self) -> MotionState {
        self.refresh().state
    }

    /// Returns `Ok(false)` when the screen is already fully open.
    pub fn open(&mut self) -> Result<bool> {
        let now = self.clock.now();
        self.model.update(now);
        if self.model.state() == MotionState::Up {
            return Ok(false);
        }

        self.send(Command::Open)?;
        self.model.start_opening(now);
        Ok(true)
    }

    /// Returns `Ok(false)` when the screen is already fully closed.
    pub fn close(&mut self) -> Result<bool> {
        let now = self.clock.now();
        self.model.update(now);
        if self.model.state() == MotionState::Down {
            return Ok(false);
        }

        self.send(Command::Close)?;
        self.model.start_closing(now);
        Ok(true)
    }

    /// Returns `Ok(false)` when the screen is not moving.
    pub fn stop(&mut self) -> Result<bool> {
        let now = self.clock.now();
        self.model.update(now);
        if self.model.state().is_rest() {
            return Ok(false);
        }

        self.send(Command::Stop)?;
        self.model.halt(now);
        Ok(true)
    }

    /// Travels toward `position` percent and stops there on a later refresh.
    pub fn set_position(&mut self, position: u8) -> Result<bool> {
        let target = f64::from(position.min(100)) / 100.0;
        if target >= 1.0 {
            return self.open();
        }
        if target <= 0.0 {
            return self.close();
        }

        let now = self.clock.now();
        let current = self.model.fraction(now);
        if current == target {
            return self.stop();
        }

        if target > current {
            self.send(Command::Open)?;
            self.model.start_opening(now);
        } else {
            self.send(Command::Close)?;
            self.model.start_closing(now);
        }
        self.model.set_target(target);
        Ok(true)
    }

    fn send(&mut self, command: Command) -> Result<()> {
        let frame = Frame::encode(command, self.address);
        match self.transport.send(&frame) {
            Ok(()) => {
                self.available = true;
                Ok(())
            }
            Err(e) => {
                if e.is_connectivity() {
                    self.available = false;
                }
                error!("Unable to {}: {}", command, e);
                Err(e)
            }
        }
    }
}
