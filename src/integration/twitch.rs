//! Twitch Helix client.
//!
//! Plain request/response over HTTPS; no background task. The broadcaster
//! id is resolved once from the channel login and kept for the process
//! lifetime. Viewer and follower counts are cached briefly so the widget
//! scheduler can poll every second without hammering the API.

use crate::command::TwitchCommand;
use crate::error::{DeckError, Result};
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const HELIX: &str = "https://api.twitch.tv/helix";

const VIEWERS_TTL: Duration = Duration::from_secs(15);
const FOLLOWERS_TTL: Duration = Duration::from_secs(60);

#[derive(Default)]
struct CountCache {
    viewers: Option<(Instant, Option<u64>)>,
    followers: Option<(Instant, u64)>,
}

pub struct TwitchClient {
    http: reqwest::Client,
    client_id: String,
    token: String,
    channel: String,
    enabled: bool,
    broadcaster_id: OnceCell<String>,
    cache: Mutex<CountCache>,
}

impl TwitchClient {
    /// Build from `TWITCH_CLIENT_ID`, `TWITCH_ACCESS_TOKEN` and
    /// `TWITCH_CHANNEL`. Missing any of the three yields a disabled
    /// client whose calls fail with an auth error.
    pub fn from_env() -> Self {
        let client_id = std::env::var("TWITCH_CLIENT_ID").unwrap_or_default();
        let token = std::env::var("TWITCH_ACCESS_TOKEN").unwrap_or_default();
        let channel = std::env::var("TWITCH_CHANNEL").unwrap_or_default();
        let enabled = !client_id.is_empty() && !token.is_empty() && !channel.is_empty();
        if !enabled {
            debug!("Twitch integration disabled (credentials not set)");
        }
        Self {
            http: reqwest::Client::new(),
            client_id,
            token,
            channel,
            enabled,
            broadcaster_id: OnceCell::new(),
            cache: Mutex::new(CountCache::default()),
        }
    }

    #[cfg(test)]
    pub(crate) fn disabled() -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: String::new(),
            token: String::new(),
            channel: String::new(),
            enabled: false,
            broadcaster_id: OnceCell::new(),
            cache: Mutex::new(CountCache::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn dispatch(&self, cmd: TwitchCommand) -> Result<()> {
        match cmd {
            TwitchCommand::Clip => self.create_clip().await,
            TwitchCommand::Ad(secs) => self.run_ad(secs).await,
            TwitchCommand::Chat(message) => self.send_chat(&message).await,
        }
    }

    /// Live viewer count, or `None` when the channel is offline.
    pub async fn viewers(&self) -> Result<Option<u64>> {
        if let Some((at, count)) = self.cache.lock().unwrap_or_else(|e| e.into_inner()).viewers {
            if at.elapsed() < VIEWERS_TTL {
                return Ok(count);
            }
        }

        let body = self
            .get(&format!("{HELIX}/streams?user_login={}", self.channel))
            .await?;
        let count = body["data"]
            .as_array()
            .and_then(|streams| streams.first())
            .and_then(|s| s["viewer_count"].as_u64());

        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .viewers = Some((Instant::now(), count));
        Ok(count)
    }

    pub async fn followers(&self) -> Result<u64> {
        if let Some((at, total)) = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .followers
        {
            if at.elapsed() < FOLLOWERS_TTL {
                return Ok(total);
            }
        }

        let id = self.broadcaster_id().await?;
        let body = self
            .get(&format!("{HELIX}/channels/followers?broadcaster_id={id}&first=1"))
            .await?;
        let total = body["total"].as_u64().unwrap_or(0);

        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .followers = Some((Instant::now(), total));
        Ok(total)
    }

    pub async fn create_clip(&self) -> Result<()> {
        let id = self.broadcaster_id().await?;
        let body = self
            .post(&format!("{HELIX}/clips?broadcaster_id={id}"), json!({}))
            .await?;
        if let Some(edit_url) = body["data"][0]["edit_url"].as_str() {
            debug!("clip created: {edit_url}");
        }
        Ok(())
    }

    pub async fn run_ad(&self, seconds: u32) -> Result<()> {
        let id = self.broadcaster_id().await?;
        self.post(
            &format!("{HELIX}/channels/commercial"),
            json!({ "broadcaster_id": id, "length": seconds }),
        )
        .await?;
        Ok(())
    }

    /// Posts to the channel's chat as the token's user (the broadcaster).
    pub async fn send_chat(&self, message: &str) -> Result<()> {
        let id = self.broadcaster_id().await?;
        self.post(
            &format!("{HELIX}/chat/messages"),
            json!({
                "broadcaster_id": id,
                "sender_id": id,
                "message": message,
            }),
        )
        .await?;
        Ok(())
    }

    async fn broadcaster_id(&self) -> Result<&str> {
        self.broadcaster_id
            .get_or_try_init(|| async {
                let body = self
                    .get(&format!("{HELIX}/users?login={}", self.channel))
                    .await?;
                body["data"][0]["id"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| DeckError::IntegrationNetwork {
                        service: "twitch",
                        message: format!("channel '{}' not found", self.channel),
                    })
            })
            .await
            .map(String::as_str)
    }

    async fn get(&self, url: &str) -> Result<Value> {
        self.check_enabled()?;
        let response = self
            .http
            .get(url)
            .header("Client-Id", &self.client_id)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(net_err)?;
        Self::read_body(response).await
    }

    async fn post(&self, url: &str, body: Value) -> Result<Value> {
        self.check_enabled()?;
        let response = self
            .http
            .post(url)
            .header("Client-Id", &self.client_id)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(net_err)?;
        Self::read_body(response).await
    }

    async fn read_body(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DeckError::IntegrationAuth {
                service: "twitch",
                message: "access token rejected (expired or missing scopes)".to_string(),
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Twitch API {status}: {text}");
            return Err(DeckError::IntegrationNetwork {
                service: "twitch",
                message: format!("HTTP {status}"),
            });
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let text = response.text().await.map_err(net_err)?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn check_enabled(&self) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(DeckError::IntegrationAuth {
                service: "twitch",
                message: "TWITCH_CLIENT_ID / TWITCH_ACCESS_TOKEN / TWITCH_CHANNEL not set"
                    .to_string(),
            })
        }
    }
}

fn net_err(e: reqwest::Error) -> DeckError {
    DeckError::IntegrationNetwork {
        service: "twitch",
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_client_refuses_calls() {
        let client = TwitchClient::disabled();
        assert!(!client.is_enabled());
        let err = client.viewers().await.unwrap_err();
        assert!(matches!(
            err,
            DeckError::IntegrationAuth { service: "twitch", .. }
        ));
        let err = client.send_chat("hi").await.unwrap_err();
        assert!(matches!(
            err,
            DeckError::IntegrationAuth { service: "twitch", .. }
        ));
    }
}
