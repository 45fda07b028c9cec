//! Hot reload of the config file.
//!
//! The configuration UI writes the same JSON file this daemon reads, so
//! external edits must take effect without a restart. A debounced notify
//! watcher runs on a blocking thread; validated reloads are published as
//! `ConfigReloaded`. Invalid edits are rejected with a log line and the
//! running config stays as it was.

use crate::event::DeckEvent;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Editors save in bursts (write + rename); coalesce them.
const DEBOUNCE: Duration = Duration::from_millis(500);

pub async fn watch_config(
    config_path: PathBuf,
    tx: broadcast::Sender<DeckEvent>,
    cancel: CancellationToken,
) {
    let (change_tx, mut change_rx) = mpsc::channel::<()>(8);

    // notify's callbacks arrive on its own thread; park a blocking task to
    // keep the debouncer alive until shutdown.
    let watcher_thread = {
        let path = config_path.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || run_debouncer(&path, &change_tx, &cancel))
    };

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            changed = change_rx.recv() => {
                if changed.is_none() {
                    // Watcher thread gone; nothing left to report.
                    break;
                }
                match crate::config::load(&config_path) {
                    Ok(config) => {
                        let _ = tx.send(DeckEvent::ConfigReloaded(Arc::new(config)));
                    }
                    Err(e) => warn!("ignoring config edit, file did not validate: {e}"),
                }
            }
        }
    }

    debug!("config watcher stopping");
    let _ = watcher_thread.await;
}

fn run_debouncer(path: &Path, change_tx: &mpsc::Sender<()>, cancel: &CancellationToken) {
    let tx = change_tx.clone();
    let debouncer = new_debouncer(
        DEBOUNCE,
        move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
            Ok(events) => {
                if events.iter().any(|e| e.kind == DebouncedEventKind::Any) {
                    let _ = tx.blocking_send(());
                }
            }
            Err(e) => warn!("file watcher error: {e}"),
        },
    );

    let mut debouncer = match debouncer {
        Ok(d) => d,
        Err(e) => {
            warn!("file watcher unavailable, hot reload disabled: {e}");
            return;
        }
    };

    if let Err(e) = debouncer
        .watcher()
        .watch(path, notify::RecursiveMode::NonRecursive)
    {
        warn!("cannot watch {}: {e}", path.display());
        return;
    }

    info!("hot reload active for {}", path.display());
    while !cancel.is_cancelled() {
        std::thread::sleep(Duration::from_millis(200));
    }
}
