use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error};

use crate::api::{MotionState, Update};
use crate::screen::Screen;
use crate::Result;

/// How often a moving screen is re-estimated.
pub const UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Handle on a time-driven screen that keeps observers informed.
///
/// While the screen travels an updater task re-estimates it every
/// [`UPDATE_INTERVAL`] and pushes each [`Update`] down the stream returned by
/// [`ScreenRef::new`]. The task ends on its own at the first rest state, when
/// the screen is stopped, or when the last handle is dropped.
#[derive(Clone)]
pub struct ScreenRef {
    inner: Arc<Inner>,
}

struct Inner {
    screen: Arc<Mutex<Screen>>,
    updates: mpsc::UnboundedSender<Update>,
    updater: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(h) = self.updater.lock().take() {
            debug!("Stop update listener");
            h.abort();
        }
    }
}

impl ScreenRef {
    /// Must be called from within a Tokio runtime.
    pub fn new(screen: Screen) -> (Self, UnboundedReceiverStream<Update>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            screen: Arc::new(Mutex::new(screen)),
            updates: tx,
            updater: Mutex::new(None),
        };
        (
            ScreenRef {
                inner: Arc::new(inner),
            },
            UnboundedReceiverStream::new(rx),
        )
    }

    pub fn open(&self) -> Result<bool> {
        let sent = self.inner.screen.lock().open()?;
        if sent {
            self.start_updater();
        }
        Ok(sent)
    }

    pub fn close(&self) -> Result<bool> {
        let sent = self.inner.screen.lock().close()?;
        if sent {
            self.start_updater();
        }
        Ok(sent)
    }

    pub fn set_position(&self, position: u8) -> Result<bool> {
        let sent = self.inner.screen.lock().set_position(position)?;
        if sent {
            self.start_updater();
        }
        Ok(sent)
    }

    pub fn stop(&self) -> Result<bool> {
        let sent = self.inner.screen.lock().stop()?;
        if sent {
            self.stop_updater();
            let _ = self.inner.updates.send(self.update());
        }
        Ok(sent)
    }

    pub fn restore_position(&self, position: f64) {
        self.inner.screen.lock().restore_position(position);
    }

    pub fn update(&self) -> Update {
        self.inner.screen.lock().refresh()
    }

    pub fn position(&self) -> f64 {
        self.update().position
    }

    pub fn state(&self) -> MotionState {
        self.update().state
    }

    pub fn is_available(&self) -> bool {
        self.inner.screen.lock().is_available()
    }

    /// Whether an updater task is currently running.
    pub fn is_updating(&self) -> bool {
        self.inner
            .updater
            .lock()
            .as_ref()
            .map_or(false, |h| !h.is_finished())
    }

    /// Replaces any previous updater. One that already sent its rest update
    /// may not have finished yet and would never poll the new motion.
    fn start_updater(&self) {
        let mut updater = self.inner.updater.lock();
        if let Some(previous) = updater.take() {
            previous.abort();
        }
        debug!("Start update listener");
        let screen = self.inner.screen.clone();
        let updates = self.inner.updates.clone();
        *updater = Some(tokio::spawn(run_updater(screen, updates)));
    }

    fn stop_updater(&self) {
        if let Some(h) = self.inner.updater.lock().take() {
            debug!("Stop update listener");
            h.abort();
        }
    }
}

async fn run_updater(screen: Arc<Mutex<Screen>>, updates: mpsc::UnboundedSender<Update>) {
    let mut interval = tokio::time::interval(UPDATE_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        // refresh may write a STOP to the serial port
        let shared = screen.clone();
        let update = match tokio::task::spawn_blocking(move || shared.lock().refresh()).await {
            Ok(update) => update,
            Err(e) => {
                error!("Screen refresh failed: {}", e);
                break;
            }
        };
        if updates.send(update).is_err() {
            debug!("no listener left, stopping updater");
            break;
        }
        if update.state.is_rest() {
            debug!("Screen at rest ({}), stopping updater", update);
            break;
        }
    }
}
