//! Daemon wiring: one broadcast bus, one task per subsystem.
//!
//! The daemon task is the only writer of page state. Key presses are
//! dispatched on their own tasks; navigation comes back over the bus so
//! page switches serialize here. Device disconnect trips a child
//! cancellation token, abandoning in-flight macros without taking the
//! daemon down.

use crate::action::ActionContext;
use crate::command::Command;
use crate::config::schema::Config;
use crate::config::watcher;
use crate::device::{DeckHandle, DeviceActor, DeviceCommand};
use crate::error::Result;
use crate::event::DeckEvent;
use crate::integration::obs::{ObsClient, ObsHandle};
use crate::integration::twitch::TwitchClient;
use crate::model::PageModel;
use crate::render;
use crate::widget::{WidgetHandle, WidgetScheduler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub async fn run(config: Config, config_path: PathBuf) -> Result<()> {
    let cancel = CancellationToken::new();
    let (events, mut rx) = broadcast::channel(EVENT_CAPACITY);

    // Icons live next to the config file, shared with the UI.
    let icons_dir = config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("icons");

    let model = Arc::new(PageModel::new(config, config_path.clone()));

    let (deck, device_join) = DeviceActor::spawn(events.clone(), cancel.clone());
    let (obs, obs_join) = ObsClient::spawn(cancel.clone());
    let twitch = Arc::new(TwitchClient::from_env());
    let (widgets, widget_join) = WidgetScheduler::spawn(
        model.clone(),
        deck.clone(),
        obs.clone(),
        twitch.clone(),
        cancel.clone(),
        icons_dir.clone(),
    );
    let watcher_join = tokio::spawn(watcher::watch_config(
        config_path,
        events.clone(),
        cancel.clone(),
    ));

    // Abandons in-flight presses on disconnect without stopping the daemon.
    let mut action_cancel = cancel.child_token();

    info!("daemon running");
    loop {
        let event = tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("signal handler failed: {e}");
                }
                DeckEvent::Shutdown
            }
            event = rx.recv() => match event {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("daemon lagged {n} events, re-uploading page");
                    DeckEvent::RenderAll
                }
                Err(broadcast::error::RecvError::Closed) => DeckEvent::Shutdown,
            },
        };

        match event {
            DeckEvent::KeyDown(key) => {
                dispatch_key(&model, key, &events, &obs, &twitch, &widgets, &action_cancel);
            }
            DeckEvent::KeyUp(key) => debug!("key {key} released"),
            DeckEvent::DeviceConnected => {
                upload_page(&model, &deck, &widgets, &icons_dir);
            }
            DeckEvent::DeviceDisconnected => {
                action_cancel.cancel();
                action_cancel = cancel.child_token();
            }
            DeckEvent::ConfigReloaded(new) => {
                if same_config(&new, &model.snapshot()) {
                    // Our own save coming back through the watcher.
                    debug!("config unchanged, skipping reload");
                    continue;
                }
                info!("applying reloaded config");
                model.replace(new);
                upload_page(&model, &deck, &widgets, &icons_dir);
            }
            DeckEvent::GoToPage(index) => {
                if model.go_to_page(index) {
                    upload_page(&model, &deck, &widgets, &icons_dir);
                }
            }
            DeckEvent::NextPage => {
                let before = model.active_index();
                if model.next_page() != before {
                    upload_page(&model, &deck, &widgets, &icons_dir);
                }
            }
            DeckEvent::PrevPage => {
                let before = model.active_index();
                if model.prev_page() != before {
                    upload_page(&model, &deck, &widgets, &icons_dir);
                }
            }
            DeckEvent::RenderAll => {
                upload_page(&model, &deck, &widgets, &icons_dir);
            }
            DeckEvent::RenderKey(key) => {
                upload_key(&model, &deck, &widgets, &icons_dir, key);
            }
            DeckEvent::Shutdown => {
                info!("shutting down");
                break;
            }
        }
    }

    cancel.cancel();
    let drain = async {
        let _ = tokio::join!(device_join, obs_join, widget_join, watcher_join);
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!("subsystems did not stop within {SHUTDOWN_GRACE:?}");
    }
    Ok(())
}

/// Look up the pressed key's command and run it on its own task.
fn dispatch_key(
    model: &Arc<PageModel>,
    key: u8,
    events: &broadcast::Sender<DeckEvent>,
    obs: &ObsHandle,
    twitch: &Arc<TwitchClient>,
    widgets: &WidgetHandle,
    action_cancel: &CancellationToken,
) {
    let config = model.snapshot();
    let Some(button) = config.active_page().button(key) else {
        debug!("key {key} has no binding");
        return;
    };
    if button.command.is_empty() {
        debug!("key {key} has no command");
        return;
    }

    let command = Command::parse(&button.command);
    debug!("key {key} -> {command:?}");

    let ctx = ActionContext {
        events: events.clone(),
        obs: obs.clone(),
        twitch: twitch.clone(),
        widgets: widgets.clone(),
        origin_key: key,
        cancel: action_cancel.clone(),
    };
    tokio::spawn(async move { ctx.execute(command).await });
}

/// Queue a full page upload (wake, clear, brightness, static faces), then
/// ask the scheduler to draw the live faces on top.
fn upload_page(model: &Arc<PageModel>, deck: &DeckHandle, widgets: &WidgetHandle, icons_dir: &Path) {
    let config = model.snapshot();
    let page = config.active_page();

    let mut images = Vec::new();
    for (key, button) in page.buttons.iter().filter_map(|(id, b)| {
        let key: u8 = id.parse().ok()?;
        Some((key, b))
    }) {
        if button.is_blank() {
            continue;
        }
        // Live faces belong to the widget scheduler.
        if matches!(Command::parse(&button.command), Command::Widget(_)) {
            continue;
        }
        match render::render_button(button, icons_dir) {
            Ok(bitmap) => images.push((key, bitmap)),
            Err(e) => warn!("render failed for key {key}: {e}"),
        }
    }

    deck.submit(DeviceCommand::LoadPage {
        brightness: model.brightness(),
        images,
    });
    widgets.refresh();
}

fn upload_key(
    model: &Arc<PageModel>,
    deck: &DeckHandle,
    widgets: &WidgetHandle,
    icons_dir: &Path,
    key: u8,
) {
    let config = model.snapshot();
    let Some(button) = config.active_page().button(key) else {
        return;
    };
    if button.is_blank() {
        return;
    }
    if matches!(Command::parse(&button.command), Command::Widget(_)) {
        widgets.refresh();
        return;
    }
    match render::render_button(button, icons_dir) {
        Ok(bitmap) => deck.submit(DeviceCommand::SetKeyImage { key, bitmap }),
        Err(e) => warn!("render failed for key {key}: {e}"),
    }
}

/// Reload events caused by our own saves carry identical content.
fn same_config(a: &Config, b: &Config) -> bool {
    serde_json::to_value(a).ok() == serde_json::to_value(b).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ButtonConfig;

    #[test]
    fn identical_configs_compare_equal() {
        let a = Config::starter();
        let b = Config::starter();
        assert!(same_config(&a, &b));
    }

    #[test]
    fn edited_configs_compare_different() {
        let a = Config::starter();
        let mut b = Config::starter();
        b.brightness = 80;
        assert!(!same_config(&a, &b));

        let mut c = Config::starter();
        c.pages[0].buttons.insert(
            "1".to_string(),
            ButtonConfig {
                label: "hi".to_string(),
                command: "__CLOCK__".to_string(),
                ..ButtonConfig::empty()
            },
        );
        assert!(!same_config(&a, &c));
    }
}
