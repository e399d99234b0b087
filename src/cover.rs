//! What a host sees. Screens mounted upside down (or lifts that open by going
//! down) are configured as inverted; inversion happens here and only here.

use crate::api::{Command, MotionState, Update};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverState {
    /// Displayed position, 0 closed and 100 open.
    pub position: u8,
    pub is_opening: bool,
    pub is_closing: bool,
    pub is_closed: bool,
}

fn displayed(position: f64, inverted: bool) -> f64 {
    let position = position.clamp(0.0, 100.0);
    if inverted {
        100.0 - position
    } else {
        position
    }
}

pub fn present(update: Update, inverted: bool) -> CoverState {
    let (opening, closing, closed) = if inverted {
        (MotionState::Downward, MotionState::Upward, MotionState::Up)
    } else {
        (MotionState::Upward, MotionState::Downward, MotionState::Down)
    };

    CoverState {
        position: displayed(update.position, inverted).round() as u8,
        is_opening: update.state == opening,
        is_closing: update.state == closing,
        is_closed: update.state == closed,
    }
}

/// Maps a host intent onto the command the screen has to receive.
pub fn host_intent(command: Command, inverted: bool) -> Command {
    if !inverted {
        return command;
    }
    match command {
        Command::Open => Command::Close,
        Command::Close => Command::Open,
        Command::Stop => Command::Stop,
        Command::SetPosition(p) => Command::SetPosition(100 - p.min(100)),
    }
}

/// Converts a position the host persisted back into the screen's own terms.
pub fn to_canonical(position: f64, inverted: bool) -> f64 {
    displayed(position, inverted)
}
