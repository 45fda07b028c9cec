//! OBS WebSocket (protocol v5) client.
//!
//! A background task owns the socket: Hello -> Identify (with the
//! challenge/salt password hash when required) -> Identified, then serves
//! toggle commands and keeps `{streaming, recording}` current from output
//! events. Connection loss triggers exponential-backoff reconnection;
//! while disconnected, commands are dropped with a log line and the status
//! reads as offline.

use crate::command::ObsCommand;
use crate::error::{DeckError, Result};
use arc_swap::ArcSwap;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_URL: &str = "ws://127.0.0.1:4455";
const DEFAULT_MIC_INPUT: &str = "Mic/Aux";

/// EventSubscription bitmask: Outputs (stream/record state changes).
const SUBSCRIBE_OUTPUTS: u64 = 64;

const BACKOFF_START: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Latest known OBS state, readable lock-free by the widget scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObsStatus {
    pub connected: bool,
    pub streaming: bool,
    pub recording: bool,
}

/// Cloneable handle used by the dispatcher and the widget scheduler.
#[derive(Clone)]
pub struct ObsHandle {
    tx: mpsc::Sender<ObsCommand>,
    status: Arc<ArcSwap<ObsStatus>>,
}

impl ObsHandle {
    /// Queue a command. Fails fast (log only) while disconnected or
    /// backlogged; OBS actions are never retried.
    pub fn send(&self, cmd: ObsCommand) {
        if !self.status.load().connected {
            warn!("OBS is not connected, dropping {cmd:?}");
            return;
        }
        if let Err(e) = self.tx.try_send(cmd) {
            warn!("OBS command dropped: {e}");
        }
    }

    pub fn status(&self) -> ObsStatus {
        **self.status.load()
    }

    /// A handle with no client behind it.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self {
            tx,
            status: Arc::new(ArcSwap::from_pointee(ObsStatus::default())),
        }
    }
}

/// A toggle request waiting for its state query to come back.
#[derive(Debug, Clone)]
enum PendingToggle {
    Stream,
    Record,
    Mute(String),
}

/// One unit of work for the serve loop.
enum Input {
    Command(ObsCommand),
    Message(Message),
    Cancelled,
}

pub struct ObsClient {
    url: String,
    password: Option<String>,
    mic_input: String,
    status: Arc<ArcSwap<ObsStatus>>,
    rx: mpsc::Receiver<ObsCommand>,
    cancel: CancellationToken,
    request_seq: u64,
    pending: HashMap<String, PendingToggle>,
}

impl ObsClient {
    /// Spawn the client task, configured from the environment
    /// (`OBS_WS_URL`, `OBS_WS_PASSWORD`, `OBS_MIC_INPUT`).
    pub fn spawn(cancel: CancellationToken) -> (ObsHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(16);
        let status = Arc::new(ArcSwap::from_pointee(ObsStatus::default()));

        let client = Self {
            url: std::env::var("OBS_WS_URL").unwrap_or_else(|_| DEFAULT_URL.to_string()),
            password: std::env::var("OBS_WS_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty()),
            mic_input: std::env::var("OBS_MIC_INPUT")
                .unwrap_or_else(|_| DEFAULT_MIC_INPUT.to_string()),
            status: status.clone(),
            rx,
            cancel,
            request_seq: 0,
            pending: HashMap::new(),
        };

        let handle = ObsHandle { tx, status };
        let join = tokio::spawn(client.run());
        (handle, join)
    }

    async fn run(mut self) {
        let mut backoff = BACKOFF_START;
        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            match self.connect_and_serve().await {
                Ok(()) => return, // cancelled from inside the session
                Err(e) => {
                    self.set_offline();
                    self.pending.clear();
                    match &e {
                        DeckError::IntegrationAuth { .. } => {
                            // A wrong password will not fix itself; don't
                            // hammer the server while the user fixes it.
                            warn!("{e}");
                            backoff = BACKOFF_MAX;
                        }
                        _ => debug!("OBS connection lost: {e}"),
                    }
                }
            }

            tokio::select! {
                () = self.cancel.cancelled() => return,
                () = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(BACKOFF_MAX);
        }
    }

    async fn connect_and_serve(&mut self) -> Result<()> {
        let (ws, _) = connect_async(self.url.as_str()).await.map_err(net_err)?;
        let (mut sink, mut source) = ws.split();
        debug!("OBS socket open, waiting for Hello");

        self.identify(&mut sink, &mut source).await?;
        info!("OBS identified at {}", self.url);
        self.update_status(|s| s.connected = true);

        // Seed streaming/recording before the first event arrives.
        self.request(&mut sink, "GetStreamStatus", "seed-stream", json!({}))
            .await?;
        self.request(&mut sink, "GetRecordStatus", "seed-record", json!({}))
            .await?;

        loop {
            let input = tokio::select! {
                () = self.cancel.cancelled() => Input::Cancelled,
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => Input::Command(cmd),
                    None => Input::Cancelled,
                },
                msg = source.next() => match msg {
                    Some(Ok(msg)) => Input::Message(msg),
                    Some(Err(e)) => return Err(net_err(e)),
                    None => return Err(net_err_str("socket closed")),
                },
            };

            match input {
                Input::Cancelled => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }
                Input::Command(cmd) => self.handle_command(&mut sink, cmd).await?,
                Input::Message(Message::Text(text)) => {
                    let value: Value = serde_json::from_str(&text)?;
                    self.handle_message(&mut sink, value).await?;
                }
                Input::Message(Message::Ping(data)) => {
                    sink.send(Message::Pong(data)).await.map_err(net_err)?;
                }
                Input::Message(Message::Close(_)) => {
                    return Err(net_err_str("server closed the session"));
                }
                Input::Message(_) => {}
            }
        }
    }

    /// Hello -> Identify -> Identified handshake (ops 0, 1, 2).
    async fn identify(&mut self, sink: &mut WsSink, source: &mut WsSource) -> Result<()> {
        let hello = next_json(source).await?;
        if hello["op"] != 0 {
            return Err(net_err_str(&format!(
                "expected Hello, got op {}",
                hello["op"]
            )));
        }

        let mut identify = json!({
            "rpcVersion": 1,
            "eventSubscriptions": SUBSCRIBE_OUTPUTS,
        });

        if let Some(auth) = hello["d"].get("authentication") {
            let password = self.password.as_deref().ok_or(DeckError::IntegrationAuth {
                service: "obs",
                message: "server requires a password but OBS_WS_PASSWORD is unset".to_string(),
            })?;
            let salt = auth["salt"].as_str().unwrap_or_default();
            let challenge = auth["challenge"].as_str().unwrap_or_default();
            identify["authentication"] = json!(auth_response(password, salt, challenge));
        }

        send_json(sink, &json!({ "op": 1, "d": identify })).await?;

        let reply = next_json(source).await?;
        match reply["op"].as_u64() {
            Some(2) => Ok(()),
            _ => Err(DeckError::IntegrationAuth {
                service: "obs",
                message: format!("identify rejected: {reply}"),
            }),
        }
    }

    /// Toggles query current state first and flip it when the response
    /// arrives; scene switches go straight out.
    async fn handle_command(&mut self, sink: &mut WsSink, cmd: ObsCommand) -> Result<()> {
        let id = self.next_request_id();

        match cmd {
            ObsCommand::ToggleStream => {
                self.pending.insert(id.clone(), PendingToggle::Stream);
                self.request(sink, "GetStreamStatus", &id, json!({})).await
            }
            ObsCommand::ToggleRecord => {
                self.pending.insert(id.clone(), PendingToggle::Record);
                self.request(sink, "GetRecordStatus", &id, json!({})).await
            }
            ObsCommand::ToggleMute => {
                let input = self.mic_input.clone();
                self.pending
                    .insert(id.clone(), PendingToggle::Mute(input.clone()));
                self.request(sink, "GetInputMute", &id, json!({ "inputName": input }))
                    .await
            }
            ObsCommand::SetScene(name) => {
                self.request(
                    sink,
                    "SetCurrentProgramScene",
                    &id,
                    json!({ "sceneName": name }),
                )
                .await
            }
        }
    }

    async fn handle_message(&mut self, sink: &mut WsSink, msg: Value) -> Result<()> {
        match msg["op"].as_u64() {
            // Event
            Some(5) => {
                let data = &msg["d"];
                let active = data["eventData"]["outputActive"].as_bool().unwrap_or(false);
                match data["eventType"].as_str() {
                    Some("StreamStateChanged") => self.update_status(|s| s.streaming = active),
                    Some("RecordStateChanged") => self.update_status(|s| s.recording = active),
                    _ => {}
                }
                Ok(())
            }
            // RequestResponse
            Some(7) => {
                let data = msg["d"].clone();
                let id = data["requestId"].as_str().unwrap_or_default().to_string();
                self.handle_response(sink, &id, &data).await
            }
            _ => Ok(()),
        }
    }

    async fn handle_response(&mut self, sink: &mut WsSink, id: &str, data: &Value) -> Result<()> {
        if !data["requestStatus"]["result"].as_bool().unwrap_or(false) {
            warn!(
                "OBS request {id} failed: {}",
                data["requestStatus"]["comment"].as_str().unwrap_or("?")
            );
            self.pending.remove(id);
            return Ok(());
        }

        let response = &data["responseData"];

        // Seed queries refresh the status snapshot.
        if id == "seed-stream" || id == "seed-record" {
            let active = response["outputActive"].as_bool().unwrap_or(false);
            if id == "seed-stream" {
                self.update_status(|s| s.streaming = active);
            } else {
                self.update_status(|s| s.recording = active);
            }
            return Ok(());
        }

        let Some(pending) = self.pending.remove(id) else {
            return Ok(());
        };

        let follow_id = self.next_request_id();
        match pending {
            PendingToggle::Stream => {
                let active = response["outputActive"].as_bool().unwrap_or(false);
                let req = if active { "StopStream" } else { "StartStream" };
                self.request(sink, req, &follow_id, json!({})).await
            }
            PendingToggle::Record => {
                let active = response["outputActive"].as_bool().unwrap_or(false);
                let req = if active { "StopRecord" } else { "StartRecord" };
                self.request(sink, req, &follow_id, json!({})).await
            }
            PendingToggle::Mute(input) => {
                let muted = response["inputMuted"].as_bool().unwrap_or(false);
                self.request(
                    sink,
                    "SetInputMute",
                    &follow_id,
                    json!({ "inputName": input, "inputMuted": !muted }),
                )
                .await
            }
        }
    }

    async fn request(
        &mut self,
        sink: &mut WsSink,
        request_type: &str,
        id: &str,
        request_data: Value,
    ) -> Result<()> {
        send_json(
            sink,
            &json!({
                "op": 6,
                "d": {
                    "requestType": request_type,
                    "requestId": id,
                    "requestData": request_data,
                }
            }),
        )
        .await
    }

    fn next_request_id(&mut self) -> String {
        self.request_seq += 1;
        format!("crtdeck-{}", self.request_seq)
    }

    fn update_status(&self, f: impl Fn(&mut ObsStatus)) {
        self.status.rcu(|current| {
            let mut next = **current;
            f(&mut next);
            next
        });
    }

    fn set_offline(&self) {
        self.status.store(Arc::new(ObsStatus::default()));
    }
}

/// obs-websocket v5 auth string:
/// `base64(sha256(base64(sha256(password + salt)) + challenge))`.
fn auth_response(password: &str, salt: &str, challenge: &str) -> String {
    let secret = BASE64.encode(Sha256::digest(format!("{password}{salt}")));
    BASE64.encode(Sha256::digest(format!("{secret}{challenge}")))
}

async fn send_json(sink: &mut WsSink, value: &Value) -> Result<()> {
    sink.send(Message::Text(value.to_string()))
        .await
        .map_err(net_err)
}

async fn next_json(source: &mut WsSource) -> Result<Value> {
    loop {
        let msg = source
            .next()
            .await
            .ok_or_else(|| net_err_str("socket closed during handshake"))?
            .map_err(net_err)?;
        if let Message::Text(text) = msg {
            return Ok(serde_json::from_str(&text)?);
        }
    }
}

fn net_err(e: tokio_tungstenite::tungstenite::Error) -> DeckError {
    DeckError::IntegrationNetwork {
        service: "obs",
        message: e.to_string(),
    }
}

fn net_err_str(msg: &str) -> DeckError {
    DeckError::IntegrationNetwork {
        service: "obs",
        message: msg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_is_deterministic() {
        let a = auth_response("hunter2", "salt", "challenge");
        let b = auth_response("hunter2", "salt", "challenge");
        assert_eq!(a, b);
        // base64 of a 32-byte digest.
        assert_eq!(a.len(), 44);
    }

    #[test]
    fn auth_response_depends_on_all_inputs() {
        let base = auth_response("hunter2", "salt", "challenge");
        assert_ne!(base, auth_response("hunter3", "salt", "challenge"));
        assert_ne!(base, auth_response("hunter2", "pepper", "challenge"));
        assert_ne!(base, auth_response("hunter2", "salt", "other"));
    }

    #[test]
    fn detached_handle_reads_offline() {
        let handle = ObsHandle::detached();
        assert_eq!(handle.status(), ObsStatus::default());
        // Dropping a command on a detached handle must not panic.
        handle.send(ObsCommand::ToggleStream);
    }
}
