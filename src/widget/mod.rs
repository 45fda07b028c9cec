//! Live key faces: clock, system gauges, timers, OBS/Twitch tiles.
//!
//! A single scheduler task owns all widget state. Every second it
//! recomputes the display text for widget keys on the active page and
//! uploads a new bitmap only when the text changed. Timers tick on every
//! page (a countdown keeps running while its page is hidden); only the
//! drawing is gated to the active page.
//!
//! Redraw-everything requests come through the handle rather than the
//! event bus so they are queued after the page upload that prompted them;
//! the device actor then applies them in order.

pub mod system;
pub mod timer;

use crate::command::{Command, WidgetKind};
use crate::config::schema::KEY_COUNT;
use crate::device::{DeckHandle, DeviceCommand};
use crate::integration::obs::ObsHandle;
use crate::integration::twitch::TwitchClient;
use crate::model::PageModel;
use crate::render;
use chrono::Local;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const TICK: Duration = Duration::from_secs(1);

/// A key press routed to the scheduler (currently only timers react).
#[derive(Debug, Clone)]
pub struct WidgetPress {
    pub key: u8,
    pub kind: WidgetKind,
}

#[derive(Debug)]
enum WidgetMsg {
    Press(WidgetPress),
    /// Drop the drawn-text cache and redraw every widget on the active
    /// page now. Sent after a page upload was queued.
    Refresh,
}

#[derive(Clone)]
pub struct WidgetHandle {
    tx: mpsc::Sender<WidgetMsg>,
}

impl WidgetHandle {
    pub fn press(&self, key: u8, kind: WidgetKind) {
        if let Err(e) = self.tx.try_send(WidgetMsg::Press(WidgetPress { key, kind })) {
            warn!("widget press dropped: {e}");
        }
    }

    pub fn refresh(&self) {
        if let Err(e) = self.tx.try_send(WidgetMsg::Refresh) {
            warn!("widget refresh dropped: {e}");
        }
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }
}

pub struct WidgetScheduler {
    model: Arc<PageModel>,
    deck: DeckHandle,
    obs: ObsHandle,
    twitch: Arc<TwitchClient>,
    icons_dir: PathBuf,
    rx: mpsc::Receiver<WidgetMsg>,
    cancel: CancellationToken,
    cpu: system::CpuSampler,
    /// Countdown state per (page, key); lives across page switches.
    timers: HashMap<(usize, u8), timer::TimerState>,
    /// Last text drawn per active-page key; cleared on page activation.
    last_drawn: HashMap<u8, String>,
}

enum Input {
    Tick,
    Msg(WidgetMsg),
    Cancelled,
}

impl WidgetScheduler {
    pub fn spawn(
        model: Arc<PageModel>,
        deck: DeckHandle,
        obs: ObsHandle,
        twitch: Arc<TwitchClient>,
        cancel: CancellationToken,
        icons_dir: PathBuf,
    ) -> (WidgetHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(32);
        let scheduler = Self {
            model,
            deck,
            obs,
            twitch,
            icons_dir,
            rx,
            cancel,
            cpu: system::CpuSampler::new(),
            timers: HashMap::new(),
            last_drawn: HashMap::new(),
        };
        let join = tokio::spawn(scheduler.run());
        (WidgetHandle { tx }, join)
    }

    async fn run(mut self) {
        let mut interval = tokio::time::interval(TICK);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            let input = tokio::select! {
                () = self.cancel.cancelled() => Input::Cancelled,
                _ = interval.tick() => Input::Tick,
                msg = self.rx.recv() => match msg {
                    Some(msg) => Input::Msg(msg),
                    None => Input::Cancelled,
                },
            };

            match input {
                Input::Cancelled => {
                    debug!("widget scheduler stopping");
                    return;
                }
                Input::Tick => {
                    self.tick_timers();
                    self.refresh().await;
                }
                Input::Msg(WidgetMsg::Press(press)) => self.handle_press(press).await,
                Input::Msg(WidgetMsg::Refresh) => {
                    self.last_drawn.clear();
                    self.prune_timers();
                    self.refresh().await;
                }
            }
        }
    }

    /// Timers run on every page; off-page expiry just logs.
    fn tick_timers(&mut self) {
        let active = self.model.active_index();
        for ((page, key), state) in self.timers.iter_mut() {
            if state.tick() {
                info!("timer on page {page} key {key} finished");
                if *page != active {
                    continue;
                }
                // Force a redraw back to the idle label.
                self.last_drawn.remove(key);
            }
        }
    }

    async fn handle_press(&mut self, press: WidgetPress) {
        let WidgetKind::Timer(minutes) = press.kind else {
            return;
        };
        let slot = (self.model.active_index(), press.key);
        self.timers
            .entry(slot)
            .or_insert_with(|| timer::TimerState::new(minutes))
            .press();
        // Show the state change now, not at the next tick.
        self.last_drawn.remove(&press.key);
        self.refresh().await;
    }

    /// Drop timer state for keys that no longer carry that timer.
    fn prune_timers(&mut self) {
        let config = self.model.snapshot();
        self.timers.retain(|(page, key), state| {
            let Some(page) = config.pages.get(*page) else {
                return false;
            };
            let Some(button) = page.button(*key) else {
                return false;
            };
            matches!(
                Command::parse(&button.command),
                Command::Widget(WidgetKind::Timer(m)) if m == state.minutes()
            )
        });
    }

    /// Recompute active-page widgets and upload the faces that changed.
    async fn refresh(&mut self) {
        let config = self.model.snapshot();
        let active = self.model.active_index();
        let Some(page) = config.pages.get(active) else {
            return;
        };

        for key in 1..=KEY_COUNT {
            let Some(button) = page.button(key) else {
                continue;
            };
            let Command::Widget(kind) = Command::parse(&button.command) else {
                continue;
            };

            let display = self.compute_display((active, key), &kind).await;
            if self.last_drawn.get(&key) == Some(&display) {
                continue;
            }

            match render::render_widget(button, &display, &self.icons_dir) {
                Ok(bitmap) => {
                    self.deck.submit(DeviceCommand::SetKeyImage { key, bitmap });
                    self.last_drawn.insert(key, display);
                }
                Err(e) => warn!("widget render failed for key {key}: {e}"),
            }
        }
    }

    async fn compute_display(&mut self, slot: (usize, u8), kind: &WidgetKind) -> String {
        match kind {
            WidgetKind::Clock => Local::now().format("%H:%M").to_string(),
            WidgetKind::ClockSeconds => Local::now().format("%H:%M:%S").to_string(),
            WidgetKind::Date => Local::now().format("%d/%m").to_string(),
            WidgetKind::DateFull => Local::now().format("%a %d %b").to_string(),
            WidgetKind::Weekday => Local::now().format("%A").to_string(),
            WidgetKind::Cpu => match self.cpu.sample() {
                Some(p) => format!("CPU\n{p}%"),
                None => "CPU\n--".to_string(),
            },
            WidgetKind::Ram => match system::ram_percent() {
                Some(p) => format!("RAM\n{p}%"),
                None => "RAM\n--".to_string(),
            },
            WidgetKind::Temp => match system::temp_celsius() {
                Some(t) => format!("{t}\u{b0}C"),
                None => "--\u{b0}C".to_string(),
            },
            WidgetKind::Timer(minutes) => self
                .timers
                .get(&slot)
                .map(timer::TimerState::display)
                .unwrap_or_else(|| format!("{minutes}m")),
            WidgetKind::ObsStatus => {
                let status = self.obs.status();
                if !status.connected {
                    "OBS\noff".to_string()
                } else {
                    match (status.streaming, status.recording) {
                        (true, true) => "LIVE\nREC".to_string(),
                        (true, false) => "LIVE".to_string(),
                        (false, true) => "REC".to_string(),
                        (false, false) => "OBS\nidle".to_string(),
                    }
                }
            }
            WidgetKind::TwitchViewers => {
                if !self.twitch.is_enabled() {
                    return "--".to_string();
                }
                match self.twitch.viewers().await {
                    Ok(Some(n)) => format_count(n),
                    Ok(None) => "offline".to_string(),
                    Err(e) => {
                        debug!("viewer count unavailable: {e}");
                        "--".to_string()
                    }
                }
            }
            WidgetKind::TwitchFollowers => {
                if !self.twitch.is_enabled() {
                    return "--".to_string();
                }
                match self.twitch.followers().await {
                    Ok(n) => format_count(n),
                    Err(e) => {
                        debug!("follower count unavailable: {e}");
                        "--".to_string()
                    }
                }
            }
        }
    }
}

/// Compact count for a 100 px face: 987, 1.2k, 45k.
fn format_count(n: u64) -> String {
    if n < 1_000 {
        n.to_string()
    } else if n < 10_000 {
        let tenths = n / 100;
        format!("{}.{}k", tenths / 10, tenths % 10)
    } else {
        format!("{}k", n / 1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ButtonConfig, Config, Page};

    fn scheduler_with(config: Config) -> (WidgetScheduler, mpsc::Receiver<DeviceCommand>) {
        let path = std::env::temp_dir()
            .join("crtdeck-widget-test")
            .join(format!("{}.json", std::process::id()));
        let (deck, device_rx) = DeckHandle::test_pair();
        let (_msg_tx, rx) = mpsc::channel(4);
        let scheduler = WidgetScheduler {
            model: Arc::new(PageModel::new(config, path)),
            deck,
            obs: ObsHandle::detached(),
            twitch: Arc::new(TwitchClient::disabled()),
            icons_dir: std::env::temp_dir(),
            rx,
            cancel: CancellationToken::new(),
            cpu: system::CpuSampler::new(),
            timers: HashMap::new(),
            last_drawn: HashMap::new(),
        };
        (scheduler, device_rx)
    }

    #[tokio::test]
    async fn refresh_ignores_widgets_off_the_active_page() {
        let mut config = Config::starter();
        let mut hidden = Page::empty("Two");
        hidden.buttons.insert(
            "1".to_string(),
            ButtonConfig {
                command: "__CLOCK__".to_string(),
                ..ButtonConfig::empty()
            },
        );
        config.pages.push(hidden);
        // Active page 0 carries no widgets.
        let (mut scheduler, mut device_rx) = scheduler_with(config);

        scheduler.refresh().await;
        assert!(device_rx.try_recv().is_err());
        assert!(scheduler.last_drawn.is_empty());
    }

    #[tokio::test]
    async fn unchanged_widget_is_uploaded_once() {
        let mut config = Config::starter();
        config.pages[0].buttons.insert(
            "2".to_string(),
            ButtonConfig {
                command: "__TIMER_5__".to_string(),
                ..ButtonConfig::empty()
            },
        );
        let (mut scheduler, mut device_rx) = scheduler_with(config);

        // Idle timer text is static, so the second pass has nothing new.
        scheduler.refresh().await;
        let Ok(DeviceCommand::SetKeyImage { key, .. }) = device_rx.try_recv() else {
            panic!("expected one face upload");
        };
        assert_eq!(key, 2);
        assert!(device_rx.try_recv().is_err());

        scheduler.refresh().await;
        assert!(device_rx.try_recv().is_err());
        assert_eq!(scheduler.last_drawn[&2], "5m");
    }

    #[tokio::test]
    async fn off_page_timer_keeps_counting() {
        let (mut scheduler, _device_rx) = scheduler_with(Config::starter());
        let mut timer = timer::TimerState::new(1);
        timer.press();
        scheduler.timers.insert((1, 4), timer);

        scheduler.tick_timers();
        assert_eq!(scheduler.timers[&(1, 4)].display(), "00:59");
    }

    #[test]
    fn count_formatting() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(987), "987");
        assert_eq!(format_count(1_234), "1.2k");
        assert_eq!(format_count(9_999), "9.9k");
        assert_eq!(format_count(45_678), "45k");
    }

    #[test]
    fn detached_handle_drops_messages_quietly() {
        let handle = WidgetHandle::detached();
        handle.press(3, WidgetKind::Timer(5));
        handle.refresh();
    }
}
