//! Key-press dispatch: one parsed command in, one effect out.
//!
//! The daemon spawns a task per press; everything here may await without
//! stalling the key listener. Navigation is routed back onto the event bus
//! so the daemon (the only component talking to the model for page state)
//! applies it.

pub mod keys;
pub mod macros;
pub mod shell;

use crate::command::Command;
use crate::error::Result;
use crate::event::DeckEvent;
use crate::integration::obs::ObsHandle;
use crate::integration::twitch::TwitchClient;
use crate::widget::WidgetHandle;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Everything a press needs to act on the rest of the daemon.
#[derive(Clone)]
pub struct ActionContext {
    pub events: broadcast::Sender<DeckEvent>,
    pub obs: ObsHandle,
    pub twitch: Arc<TwitchClient>,
    pub widgets: WidgetHandle,
    /// The key that was pressed; interactive widgets act on it.
    pub origin_key: u8,
    /// Tripped on device disconnect or shutdown; macros check it.
    pub cancel: CancellationToken,
}

impl ActionContext {
    pub async fn execute(&self, command: Command) {
        match command {
            Command::Multi(steps) => {
                let outcome = macros::MacroExecution::new(steps).run(self).await;
                debug!("macro finished: {outcome:?}");
            }
            other => {
                if let Err(e) = self.execute_single(other).await {
                    warn!("command failed on key {}: {e}", self.origin_key);
                }
            }
        }
    }

    pub(crate) async fn execute_single(&self, command: Command) -> Result<()> {
        match command {
            Command::NextPage => self.emit(DeckEvent::NextPage),
            Command::PrevPage => self.emit(DeckEvent::PrevPage),
            Command::GoToPage(index) => self.emit(DeckEvent::GoToPage(index)),
            Command::Url(url) => shell::open_url(&url),
            Command::TypeText(text) => keys::type_text(&text).await,
            Command::Hotkey(raw) => {
                let combo = keys::parse_combo(&raw)?;
                keys::send_combo(&combo).await
            }
            Command::Multi(_) => {
                // Nesting is rejected at the macro level; a bare Multi
                // should have gone through execute().
                warn!("ignoring nested macro on key {}", self.origin_key);
                Ok(())
            }
            Command::Delay(ms) => {
                // Meaningful only inside a macro.
                debug!("standalone delay of {ms} ms ignored");
                Ok(())
            }
            Command::Widget(kind) => {
                if kind.is_interactive() {
                    self.widgets.press(self.origin_key, kind);
                } else {
                    debug!("display widget {kind:?} has no press action");
                }
                Ok(())
            }
            Command::Obs(cmd) => {
                self.obs.send(cmd);
                Ok(())
            }
            Command::Twitch(cmd) => self.twitch.dispatch(cmd).await,
            Command::Shell(cmd) => shell::execute(&cmd).await,
        }
    }

    fn emit(&self, event: DeckEvent) -> Result<()> {
        // No receivers only happens during shutdown.
        let _ = self.events.send(event);
        Ok(())
    }

    /// A context wired to nothing but a live event bus, for macro tests.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, broadcast::Receiver<DeckEvent>) {
        let (events, rx) = broadcast::channel(16);
        let ctx = Self {
            events,
            obs: ObsHandle::detached(),
            twitch: Arc::new(TwitchClient::disabled()),
            widgets: WidgetHandle::detached(),
            origin_key: 1,
            cancel: CancellationToken::new(),
        };
        (ctx, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn navigation_commands_go_to_the_event_bus() {
        let (ctx, mut rx) = ActionContext::detached();
        ctx.execute(Command::NextPage).await;
        ctx.execute(Command::GoToPage(3)).await;
        assert!(matches!(rx.try_recv(), Ok(DeckEvent::NextPage)));
        assert!(matches!(rx.try_recv(), Ok(DeckEvent::GoToPage(3))));
    }

    #[tokio::test]
    async fn bad_hotkey_fails_without_side_effects() {
        let (ctx, mut rx) = ActionContext::detached();
        let err = ctx
            .execute_single(Command::Hotkey("ctrl+bogus".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::DeckError::KeyCombo { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn standalone_delay_is_a_no_op() {
        let (ctx, _rx) = ActionContext::detached();
        assert!(ctx.execute_single(Command::Delay(5000)).await.is_ok());
    }
}
