use crate::config::schema::Config;
use std::sync::Arc;

/// Events flowing through the broadcast channel connecting all subsystems.
#[derive(Debug, Clone)]
pub enum DeckEvent {
    /// A deck key was pressed (key id 1-15).
    KeyDown(u8),

    /// A deck key was released (key id 1-15).
    KeyUp(u8),

    /// Deck connected and initialized (woken, cleared, brightness set).
    DeviceConnected,

    /// Deck disconnected; the device actor is retrying in the background.
    DeviceDisconnected,

    /// Configuration was reloaded from disk (external edit, e.g. the UI).
    ConfigReloaded(Arc<Config>),

    /// Switch the active page to an absolute index.
    GoToPage(usize),

    /// Advance to the next page (wraps).
    NextPage,

    /// Go back to the previous page (wraps).
    PrevPage,

    /// Re-upload every key on the active page.
    RenderAll,

    /// Re-upload a single key on the active page.
    RenderKey(u8),

    /// Shutdown the daemon.
    Shutdown,
}
