use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info};

use crate::frame::{Address, Feedback, Frame, FrameDecoder};
use crate::{Error, Result};

pub const BAUD_RATE: u32 = 2400;
pub const TIMEOUT: Duration = Duration::from_secs(1);

/// Something that can deliver a command frame to a screen.
///
/// A successful `send` means the frame was written and flushed.
pub trait Transport: Send {
    fn send(&mut self, frame: &Frame) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        (**self).send(frame)
    }
}

/// Opens `port` with the fixed line settings: 2400 baud, 8N1, 1 s timeout.
pub fn open(port: &str) -> Result<Box<dyn SerialPort>> {
    if cfg!(unix) && !Path::new(port).exists() {
        return Err(Error::DeviceNotFound(port.to_string()));
    }

    let conn = serialport::new(port, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(TIMEOUT)
        .open()
        .map_err(|source| Error::Connection {
            port: port.to_string(),
            source,
        })?;

    debug!("Device {} connected", port);
    Ok(conn)
}

fn write_frame<W: Write + ?Sized>(conn: &mut W, port: &str, frame: &Frame) -> Result<()> {
    conn.write_all(frame.as_bytes())
        .and_then(|_| conn.flush())
        .map_err(|source| Error::Write {
            port: port.to_string(),
            source,
        })
}

/// Opens the port for every frame and closes it straight after.
pub struct SerialPortTransport {
    port: String,
}

impl SerialPortTransport {
    pub fn new(port: impl Into<String>) -> Self {
        Self { port: port.into() }
    }
}

impl Transport for SerialPortTransport {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        let mut conn = open(&self.port)?;
        let written = write_frame(conn.as_mut(), &self.port, frame);
        drop(conn);

        match written {
            Ok(()) => {
                info!("Command {} sent to {}", frame, self.port);
                Ok(())
            }
            Err(e) => {
                error!("{}", e);
                Err(e)
            }
        }
    }
}

/// A connection held open for the screen's lifetime.
pub struct SerialLink {
    port: String,
    conn: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open(port: impl Into<String>) -> Result<Self> {
        let port = port.into();
        let conn = open(&port)?;
        Ok(Self { port, conn })
    }

    /// A second handle on the same port for the reader thread.
    pub fn reader(&self) -> Result<Box<dyn SerialPort>> {
        self.conn.try_clone().map_err(|source| Error::Connection {
            port: self.port.clone(),
            source,
        })
    }
}

impl Transport for SerialLink {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        write_frame(self.conn.as_mut(), &self.port, frame)?;
        info!("Command {} sent to {}", frame, self.port);
        Ok(())
    }
}

/// Reads feedback frames from `reader` and hands each one to `sink`.
///
/// Returns when `kill` fires or is dropped, when the stream ends, or with the
/// first I/O error other than a read timeout.
pub fn read_frames<R: Read>(
    mut reader: R,
    port: &str,
    address: Address,
    mut kill: mpsc::Receiver<()>,
    mut sink: impl FnMut(Feedback),
) -> Result<()> {
    let mut decoder = FrameDecoder::new(address);
    let mut buf = [0u8; 64];

    while let Err(TryRecvError::Empty) = kill.try_recv() {
        match reader.read(&mut buf) {
            Ok(0) => {
                debug!("{}: end of stream", port);
                break;
            }
            Ok(n) => {
                for feedback in decoder.push(&buf[..n]) {
                    sink(feedback);
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(source) => {
                return Err(Error::Read {
                    port: port.to_string(),
                    source,
                })
            }
        }
    }
    debug!("reader for {} exiting...", port);

    Ok(())
}
