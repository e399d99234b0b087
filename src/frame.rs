//! Fixed five-byte frames spoken by the screen controllers.
//!
//! Commands go out as `FF a0 a1 a2 op`, where `a0 a1 a2` is the device address
//! and `op` selects up, down, stop or a target position. Controllers with
//! feedback report `a0 a1 a2 st pos`. Anything else on the line is noise.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::api::{Command, MotionState};
use crate::Error;

pub const FRAME_LEN: usize = 5;
pub const PREAMBLE: u8 = 0xFF;

pub const OPCODE_UP: u8 = 0xDD;
pub const OPCODE_DOWN: u8 = 0xEE;
pub const OPCODE_STOP: u8 = 0xCC;

pub const STATUS_UP: u8 = 0xA1;
pub const STATUS_UPWARD: u8 = 0xA2;
pub const STATUS_STOPPED: u8 = 0xA3;
pub const STATUS_DOWNWARD: u8 = 0xA4;
pub const STATUS_DOWN: u8 = 0xA5;

const MAX_POSITION: u8 = 100;

/// Three byte device address, `AAEEEE` for most screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 3]);

impl Address {
    pub const DEFAULT: Address = Address([0xAA, 0xEE, 0xEE]);
    pub const ALTERNATE: Address = Address([0xEE, 0xEE, 0xEE]);

    pub const fn new(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 3] {
        self.0
    }
}

impl Default for Address {
    fn default() -> Self {
        Address::DEFAULT
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s.trim())
            .map_err(|e| Error::Configuration(format!("address {:?} is not hex: {}", s, e)))?;
        let bytes: [u8; 3] = raw.try_into().map_err(|_| {
            Error::Configuration(format!("address {:?} must be exactly 3 bytes", s))
        })?;
        Ok(Address(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.to_string()
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

/// An encoded command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    pub fn encode(command: Command, address: Address) -> Self {
        let [a0, a1, a2] = address.bytes();
        let op = match command {
            Command::Open => OPCODE_UP,
            Command::Close => OPCODE_DOWN,
            Command::Stop => OPCODE_STOP,
            Command::SetPosition(p) => p.min(MAX_POSITION),
        };
        Frame([PREAMBLE, a0, a1, a2, op])
    }

    /// Reads back a command frame sent to `address`, e.g. one issued by another
    /// controller on a shared bus.
    pub fn decode_command(bytes: &[u8], address: Address) -> Option<Command> {
        let [a0, a1, a2] = address.bytes();
        match bytes {
            [PREAMBLE, b0, b1, b2, op] if [*b0, *b1, *b2] == [a0, a1, a2] => match *op {
                OPCODE_UP => Some(Command::Open),
                OPCODE_DOWN => Some(Command::Close),
                OPCODE_STOP => Some(Command::Stop),
                p if p <= MAX_POSITION => Some(Command::SetPosition(p)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Frame> for [u8; FRAME_LEN] {
    fn from(f: Frame) -> Self {
        f.0
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

/// A status report from a controller with feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feedback {
    pub state: MotionState,
    /// Raw position, 0..=100.
    pub position: u8,
}

impl Feedback {
    pub fn new(state: MotionState, position: u8) -> Self {
        Self {
            state,
            position: position.min(MAX_POSITION),
        }
    }

    pub fn encode(&self, address: Address) -> [u8; FRAME_LEN] {
        let [a0, a1, a2] = address.bytes();
        let status = match self.state {
            MotionState::Up => STATUS_UP,
            MotionState::Upward => STATUS_UPWARD,
            MotionState::Stopped => STATUS_STOPPED,
            MotionState::Downward => STATUS_DOWNWARD,
            MotionState::Down => STATUS_DOWN,
        };
        [a0, a1, a2, status, self.position]
    }

    pub fn decode(bytes: &[u8], address: Address) -> Option<Feedback> {
        let [a0, a1, a2] = address.bytes();
        let (status, position) = match bytes {
            [b0, b1, b2, st, pos] if [*b0, *b1, *b2] == [a0, a1, a2] => (*st, *pos),
            _ => return None,
        };
        if position > MAX_POSITION {
            return None;
        }
        let state = match status {
            STATUS_UP => MotionState::Up,
            STATUS_UPWARD => MotionState::Upward,
            STATUS_STOPPED => MotionState::Stopped,
            STATUS_DOWNWARD => MotionState::Downward,
            STATUS_DOWN => MotionState::Down,
            _ => return None,
        };
        Some(Feedback { state, position })
    }
}

/// Splits a byte stream into feedback frames.
///
/// Bytes that do not start a valid frame are dropped one at a time, so the
/// decoder resynchronises after partial reads or foreign traffic.
/// Fewer than [`FRAME_LEN`] bytes are held between pushes.
pub struct FrameDecoder {
    address: Address,
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            buf: Vec::with_capacity(FRAME_LEN * 4),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<Feedback> {
        self.buf.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut start = 0;
        while self.buf.len() - start >= FRAME_LEN {
            match Feedback::decode(&self.buf[start..start + FRAME_LEN], self.address) {
                Some(feedback) => {
                    frames.push(feedback);
                    start += FRAME_LEN;
                }
                None => start += 1,
            }
        }
        self.buf.drain(..start);

        frames
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn fixed_address_frames() {
        let a = Address::DEFAULT;
        assert_eq!(
            Frame::encode(Command::Open, a).as_bytes(),
            &[0xFF, 0xAA, 0xEE, 0xEE, 0xDD]
        );
        assert_eq!(
            Frame::encode(Command::Close, a).as_bytes(),
            &[0xFF, 0xAA, 0xEE, 0xEE, 0xEE]
        );
        assert_eq!(
            Frame::encode(Command::Stop, a).as_bytes(),
            &[0xFF, 0xAA, 0xEE, 0xEE, 0xCC]
        );
    }

    #[test]
    fn alternate_address_substitutes_address_bytes() {
        let frame = Frame::encode(Command::Open, Address::ALTERNATE);
        assert_eq!(frame.to_string(), "FFEEEEEEDD");
    }

    #[test]
    fn set_position_carries_target() {
        let frame = Frame::encode(Command::SetPosition(37), Address::DEFAULT);
        assert_eq!(frame.as_bytes()[4], 37);
        let clamped = Frame::encode(Command::SetPosition(250), Address::DEFAULT);
        assert_eq!(clamped.as_bytes()[4], 100);
    }

    #[test]
    fn commands_read_back() {
        for address in [Address::DEFAULT, Address::ALTERNATE, Address::new([1, 2, 3])] {
            for command in [
                Command::Open,
                Command::Close,
                Command::Stop,
                Command::SetPosition(0),
                Command::SetPosition(64),
                Command::SetPosition(100),
            ] {
                let frame = Frame::encode(command, address);
                let decoded = Frame::decode_command(frame.as_bytes(), address);
                assert_eq!(decoded, Some(command));
                assert_eq!(decoded.and_then(|c| c.induced_state()), command.induced_state());
            }
        }
    }

    #[test]
    fn command_for_other_address_is_ignored() {
        let frame = Frame::encode(Command::Open, Address::ALTERNATE);
        assert_eq!(Frame::decode_command(frame.as_bytes(), Address::DEFAULT), None);
    }

    #[test]
    fn feedback_rejects_noise() {
        let a = Address::DEFAULT;
        assert_eq!(Feedback::decode(&[], a), None);
        assert_eq!(Feedback::decode(&[0xAA, 0xEE, 0xEE, 0xA3], a), None);
        assert_eq!(Feedback::decode(&[0xAA, 0xEE, 0xEE, 0xA3, 101], a), None);
        assert_eq!(Feedback::decode(&[0xAA, 0xEE, 0xEE, 0x10, 10], a), None);
        assert_eq!(Feedback::decode(&[0xEE, 0xEE, 0xEE, 0xA3, 10], a), None);
        assert_eq!(
            Feedback::decode(&[0xAA, 0xEE, 0xEE, 0xA3, 37], a),
            Some(Feedback::new(MotionState::Stopped, 37))
        );
    }

    #[test]
    fn command_frames_are_not_feedback() {
        let mut decoder = FrameDecoder::new(Address::DEFAULT);
        let mut bytes = Vec::new();
        for command in [Command::Open, Command::Close, Command::Stop] {
            bytes.extend_from_slice(Frame::encode(command, Address::DEFAULT).as_bytes());
        }
        assert!(decoder.push(&bytes).is_empty());
    }

    #[test]
    fn decoder_handles_split_and_noisy_input() {
        let a = Address::DEFAULT;
        let first = Feedback::new(MotionState::Downward, 80).encode(a);
        let second = Feedback::new(MotionState::Stopped, 37).encode(a);

        let mut decoder = FrameDecoder::new(a);
        assert!(decoder.push(&[0x00, 0x13]).is_empty());
        assert!(decoder.push(&first[..3]).is_empty());
        assert_eq!(decoder.push(&first[3..]), vec![Feedback::new(MotionState::Downward, 80)]);

        let mut tail = vec![0xFF, 0xAA];
        tail.extend_from_slice(&second);
        assert_eq!(decoder.push(&tail), vec![Feedback::new(MotionState::Stopped, 37)]);
        assert!(decoder.pending() < FRAME_LEN);
    }

    #[test]
    fn address_parsing() {
        assert_eq!("aaeeee".parse::<Address>().unwrap(), Address::DEFAULT);
        assert_eq!("EEEEEE".parse::<Address>().unwrap(), Address::ALTERNATE);
        assert!(matches!("AAEE".parse::<Address>(), Err(Error::Configuration(_))));
        assert!(matches!("AAEEEEEE".parse::<Address>(), Err(Error::Configuration(_))));
        assert!(matches!("zzeeee".parse::<Address>(), Err(Error::Configuration(_))));
        assert_eq!(Address::DEFAULT.to_string(), "AAEEEE");
    }

    proptest! {
        #[test]
        fn decoding_arbitrary_bytes_never_panics(
            bytes in proptest::collection::vec(any::<u8>(), 0..64)
        ) {
            let _ = Feedback::decode(&bytes, Address::DEFAULT);
            let _ = Frame::decode_command(&bytes, Address::DEFAULT);
            let mut decoder = FrameDecoder::new(Address::DEFAULT);
            for feedback in decoder.push(&bytes) {
                prop_assert!(feedback.position <= 100);
            }
        }
    }
}
