pub mod codec;
pub mod protocol;
pub mod session;
pub mod transport;

use crate::error::{DeckError, Result};
use crate::event::DeckEvent;
use image::RgbImage;
use session::DeviceSession;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const POLL_TIMEOUT: Duration = Duration::from_millis(100);
const RECONNECT_INTERVAL: Duration = Duration::from_secs(2);
const BUSY_RETRY_INTERVAL: Duration = Duration::from_secs(5);
const COMMAND_CAPACITY: usize = 64;

/// Writes requested from other subsystems. Executed in order on the actor
/// thread, interleaved with key-event polling at packet boundaries only.
#[derive(Debug)]
pub enum DeviceCommand {
    SetKeyImage { key: u8, bitmap: RgbImage },
    SetBrightness(u8),
    Wake,
    ClearAll,
    /// Full page upload: wake, clear, brightness, then each key image.
    LoadPage {
        brightness: u8,
        images: Vec<(u8, RgbImage)>,
    },
}

/// Cloneable sender half used by the daemon and the widget scheduler.
#[derive(Clone)]
pub struct DeckHandle {
    tx: mpsc::Sender<DeviceCommand>,
}

impl DeckHandle {
    /// Queue a command for the device actor. Dropped (with a log line) when
    /// the queue is full or the actor is gone — a missed frame, not a fault.
    pub fn submit(&self, cmd: DeviceCommand) {
        if let Err(e) = self.tx.try_send(cmd) {
            warn!("device command dropped: {e}");
        }
    }

    /// A handle whose queue is inspectable instead of device-backed.
    #[cfg(test)]
    pub(crate) fn test_pair() -> (Self, mpsc::Receiver<DeviceCommand>) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        (Self { tx }, rx)
    }
}

/// Owns the USB session on a dedicated blocking thread: discover, claim,
/// serve commands + key polling, reconnect on disconnect.
pub struct DeviceActor {
    events: broadcast::Sender<DeckEvent>,
    cancel: CancellationToken,
    rx: mpsc::Receiver<DeviceCommand>,
}

impl DeviceActor {
    pub fn spawn(
        events: broadcast::Sender<DeckEvent>,
        cancel: CancellationToken,
    ) -> (DeckHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let actor = Self { events, cancel, rx };
        let join = tokio::task::spawn_blocking(move || actor.run());
        (DeckHandle { tx }, join)
    }

    fn run(mut self) {
        info!("device actor started");
        while !self.cancel.is_cancelled() {
            match DeviceSession::open() {
                Ok(mut session) => {
                    info!("deck connected");
                    let _ = self.events.send(DeckEvent::DeviceConnected);

                    if let Err(e) = self.serve(&session) {
                        warn!("deck session ended: {e}");
                    }
                    session.close();

                    // Pending writes target a dead handle; drop them.
                    while self.rx.try_recv().is_ok() {}
                    let _ = self.events.send(DeckEvent::DeviceDisconnected);
                    self.sleep(RECONNECT_INTERVAL);
                }
                Err(DeckError::DeviceBusy) => {
                    // Another process holds the interface; retrying alone
                    // will not fix it, the user has to close that process.
                    error!("deck is claimed by another process; close it to continue");
                    self.sleep(BUSY_RETRY_INTERVAL);
                }
                Err(DeckError::DeviceNotFound) => {
                    debug!("no deck on the bus, retrying");
                    self.sleep(RECONNECT_INTERVAL);
                }
                Err(e) => {
                    warn!("deck open failed: {e}");
                    self.sleep(RECONNECT_INTERVAL);
                }
            }
        }
        info!("device actor stopped");
    }

    /// Serve one connected session until cancellation or disconnect.
    fn serve(&mut self, session: &DeviceSession) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            // Drain queued writes first so page loads and widget updates
            // are not starved by the poll timeout.
            while let Ok(cmd) = self.rx.try_recv() {
                if let Err(e) = execute(session, cmd) {
                    if e.is_disconnect() {
                        return Err(e);
                    }
                    // Single-transfer failure: log and keep the session.
                    warn!("device write failed: {e}");
                }
            }

            match session.poll_key_event(POLL_TIMEOUT) {
                Ok(Some((key, pressed))) => {
                    debug!("key {key} {}", if pressed { "down" } else { "up" });
                    let event = if pressed {
                        DeckEvent::KeyDown(key)
                    } else {
                        DeckEvent::KeyUp(key)
                    };
                    let _ = self.events.send(event);
                }
                Ok(None) => {}
                Err(e) if e.is_disconnect() => return Err(e),
                Err(e) => warn!("key poll failed: {e}"),
            }
        }
    }

    /// Interruptible sleep so shutdown is not delayed by a backoff.
    fn sleep(&self, total: Duration) {
        let step = Duration::from_millis(100);
        let mut remaining = total;
        while !self.cancel.is_cancelled() && !remaining.is_zero() {
            let nap = remaining.min(step);
            std::thread::sleep(nap);
            remaining -= nap;
        }
    }
}

fn execute(session: &DeviceSession, cmd: DeviceCommand) -> Result<()> {
    match cmd {
        DeviceCommand::SetKeyImage { key, bitmap } => session.set_key_image(key, &bitmap),
        DeviceCommand::SetBrightness(percent) => session.set_brightness(percent),
        DeviceCommand::Wake => session.wake(),
        DeviceCommand::ClearAll => session.clear_all(),
        DeviceCommand::LoadPage { brightness, images } => {
            session.wake()?;
            session.clear_all()?;
            session.set_brightness(brightness)?;
            for (key, bitmap) in images {
                if let Err(e) = session.set_key_image(key, &bitmap) {
                    if e.is_disconnect() {
                        return Err(e);
                    }
                    warn!("key {key} upload failed: {e}");
                }
            }
            Ok(())
        }
    }
}
