//! Screens that report their own state and position.
//!
//! The link stays open for the screen's lifetime. A reader thread decodes
//! status frames into the model and notifies callbacks; commands only ask the
//! device to move and never touch the state themselves.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::api::{Command, MotionState, Update};
use crate::frame::{Address, Feedback, Frame};
use crate::serial::{read_frames, SerialLink, Transport};
use crate::{Error, Result};

pub type Callback = Arc<dyn Fn(Update) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackModel {
    state: MotionState,
    position: u8,
    target: Option<u8>,
}

impl FeedbackModel {
    pub fn new(position: u8) -> Self {
        let position = position.min(100);
        Self {
            state: MotionState::at_rest(f64::from(position)),
            position,
            target: None,
        }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn position(&self) -> u8 {
        self.position
    }

    pub fn target(&self) -> Option<u8> {
        self.target
    }

    pub fn update(&self) -> Update {
        Update {
            state: self.state,
            position: f64::from(self.position),
        }
    }

    pub fn restore(&mut self, position: f64) {
        *self = FeedbackModel::new(position.clamp(0.0, 100.0).round() as u8);
    }

    /// Takes in a decoded report. Returns the new snapshot if anything changed.
    pub fn apply(&mut self, feedback: Feedback) -> Option<Update> {
        if feedback.state.is_rest() {
            self.target = None;
        }
        if (feedback.state, feedback.position) == (self.state, self.position) {
            return None;
        }
        self.state = feedback.state;
        self.position = feedback.position;
        Some(self.update())
    }
}

struct Shared {
    model: Mutex<FeedbackModel>,
    callbacks: Mutex<Vec<Callback>>,
    available: AtomicBool,
}

impl Shared {
    fn deliver(&self, feedback: Feedback) {
        let changed = self.model.lock().apply(feedback);
        if let Some(update) = changed {
            debug!("Screen reported {}", update);
            let callbacks = self.callbacks.lock().clone();
            for callback in callbacks {
                callback(update);
            }
        }
    }
}

pub struct FeedbackScreen {
    port: String,
    address: Address,
    transport: Mutex<Box<dyn Transport>>,
    shared: Arc<Shared>,
    kill: Option<mpsc::Sender<()>>,
    reader: Option<JoinHandle<Result<()>>>,
}

impl FeedbackScreen {
    /// Opens `port` and starts reading status frames straight away.
    pub fn connect(port: &str, address: Address, position: u8) -> Result<Self> {
        let link = SerialLink::open(port)?;
        let reader = link.reader()?;
        let mut screen = Self::new(Box::new(link), port, address, position);
        screen.listen(reader);
        Ok(screen)
    }

    /// A screen that sends through `transport`. Nothing is read until
    /// [`listen`](Self::listen) is called.
    pub fn new(
        transport: Box<dyn Transport>,
        port: impl Into<String>,
        address: Address,
        position: u8,
    ) -> Self {
        Self {
            port: port.into(),
            address,
            transport: Mutex::new(transport),
            shared: Arc::new(Shared {
                model: Mutex::new(FeedbackModel::new(position)),
                callbacks: Mutex::new(Vec::new()),
                available: AtomicBool::new(true),
            }),
            kill: None,
            reader: None,
        }
    }

    /// Spawns the reader thread. A running reader is stopped first.
    pub fn listen<R: Read + Send + 'static>(&mut self, reader: R) {
        self.kill.take();
        if let Some(previous) = self.reader.take() {
            let _ = previous.join();
        }

        let (kill_tx, kill_rx) = mpsc::channel(1);
        let shared = self.shared.clone();
        let port = self.port.clone();
        let address = self.address;

        let h = std::thread::spawn(move || {
            let result = read_frames(reader, &port, address, kill_rx, |feedback| {
                shared.deliver(feedback)
            });
            if let Err(e) = &result {
                error!("{}", e);
                shared.available.store(false, Ordering::Relaxed);
            }
            result
        });

        self.kill = Some(kill_tx);
        self.reader = Some(h);
    }

    pub fn add_callback(&self, callback: impl Fn(Update) + Send + Sync + 'static) {
        self.shared.callbacks.lock().push(Arc::new(callback));
    }

    pub fn restore_position(&self, position: f64) {
        debug!("Last screen position: {:5.1} %", position);
        self.shared.model.lock().restore(position);
    }

    pub fn position(&self) -> f64 {
        f64::from(self.shared.model.lock().position())
    }

    pub fn state(&self) -> MotionState {
        self.shared.model.lock().state()
    }

    pub fn update(&self) -> Update {
        self.shared.model.lock().update()
    }

    /// Target of the last position command, until the screen comes to rest.
    pub fn target(&self) -> Option<u8> {
        self.shared.model.lock().target()
    }

    /// False once the reader has failed or a command could not be written.
    pub fn is_available(&self) -> bool {
        self.shared.available.load(Ordering::Relaxed)
    }

    pub fn open(&self) -> Result<bool> {
        let mut model = self.shared.model.lock();
        if model.state() == MotionState::Up {
            return Ok(false);
        }
        self.send(Command::Open)?;
        model.target = None;
        Ok(true)
    }

    pub fn close(&self) -> Result<bool> {
        let mut model = self.shared.model.lock();
        if model.state() == MotionState::Down {
            return Ok(false);
        }
        self.send(Command::Close)?;
        model.target = None;
        Ok(true)
    }

    pub fn stop(&self) -> Result<bool> {
        let mut model = self.shared.model.lock();
        if model.state().is_rest() {
            return Ok(false);
        }
        self.send(Command::Stop)?;
        model.target = None;
        Ok(true)
    }

    /// The device stops by itself at `position` and reports `Stopped`.
    pub fn set_position(&self, position: u8) -> Result<bool> {
        let position = position.min(100);
        let mut model = self.shared.model.lock();
        if model.state().is_rest() && model.position() == position {
            return Ok(false);
        }
        self.send(Command::SetPosition(position))?;
        model.target = Some(position);
        Ok(true)
    }

    /// Stops the reader and waits for it, returning the error that ended it.
    pub fn shutdown(mut self) -> Result<()> {
        self.kill.take();
        match self.reader.take() {
            Some(h) => h
                .join()
                .map_err(|_| Error::ReaderThread("Join failed".to_string()))?,
            None => Ok(()),
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        let frame = Frame::encode(command, self.address);
        let sent = self.transport.lock().send(&frame);
        match &sent {
            Ok(()) => self.shared.available.store(true, Ordering::Relaxed),
            Err(e) => {
                if e.is_connectivity() {
                    self.shared.available.store(false, Ordering::Relaxed);
                }
                error!("Unable to {}: {}", command, e);
            }
        }
        sent
    }
}

impl Drop for FeedbackScreen {
    fn drop(&mut self) {
        debug!("dropping screen on {}", self.port);
        self.kill.take();
    }
}
