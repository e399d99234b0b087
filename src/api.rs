use std::fmt::{Display, Formatter};

/// Motion state of a screen.
///
/// `Up` and `Down` are the end stops (100% and 0%), `Stopped` is a rest state
/// somewhere in between, `Upward` and `Downward` are travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionState {
    Up,
    Upward,
    Stopped,
    Downward,
    Down,
}

impl MotionState {
    pub fn is_moving(&self) -> bool {
        matches!(self, MotionState::Upward | MotionState::Downward)
    }

    pub fn is_rest(&self) -> bool {
        !self.is_moving()
    }

    /// Rest state for a position reached without a motion in progress.
    pub fn at_rest(position: f64) -> Self {
        if position >= 100.0 {
            MotionState::Up
        } else if position <= 0.0 {
            MotionState::Down
        } else {
            MotionState::Stopped
        }
    }
}

impl Display for MotionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MotionState::Up => f.write_str("up"),
            MotionState::Upward => f.write_str("upward"),
            MotionState::Stopped => f.write_str("stopped"),
            MotionState::Downward => f.write_str("downward"),
            MotionState::Down => f.write_str("down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Open,
    Close,
    Stop,
    /// Target travel percentage, 0 closed and 100 open.
    SetPosition(u8),
}

impl Command {
    /// The motion this command asks the screen to start, if it is known up front.
    pub fn induced_state(&self) -> Option<MotionState> {
        match self {
            Command::Open => Some(MotionState::Upward),
            Command::Close => Some(MotionState::Downward),
            Command::Stop => Some(MotionState::Stopped),
            Command::SetPosition(_) => None,
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Open => f.write_str("open"),
            Command::Close => f.write_str("close"),
            Command::Stop => f.write_str("stop"),
            Command::SetPosition(p) => write!(f, "set position {}", p),
        }
    }
}

/// A (state, position) snapshot handed to observers. Position is 0..=100 in
/// the canonical direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Update {
    pub state: MotionState,
    pub position: f64,
}

impl Display for Update {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:5.1} %", self.state, self.position)
    }
}
