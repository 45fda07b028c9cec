//! External service clients (OBS WebSocket, Twitch Helix).

pub mod obs;
pub mod twitch;
