#![allow(dead_code)]

use std::io::{self, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use parking_lot::Mutex;

use screenman::frame::Frame;
use screenman::serial::Transport;
use screenman::{Error, Result};

/// Records every frame and can be switched to fail like an unplugged adapter.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub frames: Arc<Mutex<Vec<Frame>>>,
    pub unplugged: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn unplug(&self, unplugged: bool) {
        self.unplugged.store(unplugged, Ordering::Relaxed);
    }

    pub fn sent(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        if self.unplugged.load(Ordering::Relaxed) {
            return Err(Error::Write {
                port: "/dev/ttyTEST".to_string(),
                source: io::Error::new(ErrorKind::BrokenPipe, "unplugged"),
            });
        }
        self.frames.lock().push(*frame);
        Ok(())
    }
}

/// The device side of a feedback link: bytes written to the sender come out of
/// the reader, which times out like a serial port when nothing arrives.
pub struct DeviceLine {
    rx: mpsc::Receiver<Vec<u8>>,
}

pub fn device_line() -> (mpsc::Sender<Vec<u8>>, DeviceLine) {
    let (tx, rx) = mpsc::channel();
    (tx, DeviceLine { rx })
}

impl Read for DeviceLine {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.rx.recv_timeout(Duration::from_millis(20)) {
            Ok(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Err(io::Error::new(ErrorKind::TimedOut, "no data"))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Ok(0),
        }
    }
}
