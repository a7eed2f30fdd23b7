//! Discord presence: custom status over the gateway, nicknames over REST.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{DestinationId, PresenceSink};
use crate::error::PresenceError;

const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
const API_BASE: &str = "https://discord.com/api/v10";
const INTENT_GUILDS: u64 = 1;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Discord rejects nicknames longer than this.
const MAX_NICK_CHARS: usize = 32;

mod op {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const PRESENCE_UPDATE: u8 = 3;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    s: Option<u64>,
    t: Option<String>,
}

type Guilds = Arc<RwLock<BTreeSet<DestinationId>>>;
/// True between `READY` and the end of that session.
type Online = Arc<watch::Sender<bool>>;

pub struct DiscordPresence {
    token: String,
    http: Client,
    api_base: String,
    timeout: Duration,
    guilds: Guilds,
    status: watch::Sender<Option<String>>,
    online: Online,
    gateway: JoinHandle<()>,
}

impl DiscordPresence {
    /// Connect to the gateway in the background and return immediately.
    /// `initial_status` is announced with the identify payload.
    pub fn connect(token: impl Into<String>, initial_status: Option<String>) -> Self {
        let token = token.into();
        let guilds: Guilds = Arc::new(RwLock::new(BTreeSet::new()));
        let online: Online = Arc::new(watch::Sender::new(false));
        let (status, status_rx) = watch::channel(initial_status);

        let gateway = tokio::spawn(run_gateway(
            token.clone(),
            guilds.clone(),
            status_rx,
            online.clone(),
        ));

        Self {
            token,
            http: Client::new(),
            api_base: API_BASE.to_string(),
            timeout: Duration::from_secs(10),
            guilds,
            status,
            online,
            gateway,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.online.borrow()
    }
}

impl Drop for DiscordPresence {
    fn drop(&mut self) {
        self.gateway.abort();
    }
}

#[async_trait]
impl PresenceSink for DiscordPresence {
    async fn set_status_text(&self, message: &str) -> Result<(), PresenceError> {
        // While disconnected the next session identifies with it.
        self.status.send_replace(Some(message.to_string()));
        if !self.is_connected() {
            tracing::debug!(target: "presence", "gateway not connected yet, status queued");
        }
        Ok(())
    }

    /// Guild ids are only known once the gateway has sent `READY`.
    async fn ready(&self) {
        let mut rx = self.online.subscribe();
        let _ = rx.wait_for(|up| *up).await;
    }

    async fn destinations(&self) -> Vec<DestinationId> {
        self.guilds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    async fn set_display_name(
        &self,
        destination: DestinationId,
        name: &str,
    ) -> Result<(), PresenceError> {
        let url = format!("{}/guilds/{destination}/members/@me", self.api_base);
        let nick: String = name.chars().take(MAX_NICK_CHARS).collect();

        let rsp = self
            .http
            .patch(&url)
            .header(AUTHORIZATION, format!("Bot {}", self.token))
            .timeout(self.timeout)
            .json(&json!({ "nick": nick }))
            .send()
            .await
            .map_err(|e| PresenceError::Transport(e.to_string()))?;

        match rsp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::FORBIDDEN => Err(PresenceError::PermissionDenied { destination }),
            StatusCode::TOO_MANY_REQUESTS => {
                let body: Value = rsp.json().await.unwrap_or(Value::Null);
                Err(PresenceError::RateLimited {
                    retry_after_secs: body
                        .get("retry_after")
                        .and_then(Value::as_f64)
                        .unwrap_or(1.0),
                })
            }
            s => Err(PresenceError::Other(format!("nickname update: HTTP {s}"))),
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

async fn run_gateway(
    token: String,
    guilds: Guilds,
    mut status: watch::Receiver<Option<String>>,
    online: Online,
) {
    loop {
        match session(&token, &guilds, &mut status, &online).await {
            Ok(()) => tracing::info!(target: "presence", "gateway session ended, reconnecting"),
            Err(e) => tracing::warn!(target: "presence", error = %e, "gateway session failed"),
        }
        online.send_replace(false);
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn session(
    token: &str,
    guilds: &Guilds,
    status: &mut watch::Receiver<Option<String>>,
    online: &watch::Sender<bool>,
) -> Result<()> {
    let (ws, _) = connect_async(GATEWAY_URL)
        .await
        .context("gateway connect")?;
    let (mut tx, mut rx) = ws.split();

    let hello = loop {
        match rx.next().await {
            Some(Ok(Message::Text(text))) => break serde_json::from_str::<GatewayPayload>(&text)?,
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e).context("waiting for hello"),
            None => bail!("gateway closed before hello"),
        }
    };
    if hello.op != op::HELLO {
        bail!("expected hello, got op {}", hello.op);
    }
    let interval_ms = hello
        .d
        .get("heartbeat_interval")
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("hello without heartbeat_interval"))?;
    let period = Duration::from_millis(interval_ms);
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    let initial = status.borrow_and_update().clone();
    tx.send(Message::Text(identify_payload(token, initial.as_deref()).to_string()))
        .await
        .context("identify")?;

    let mut seq: Option<u64> = None;
    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                tx.send(Message::Text(json!({ "op": op::HEARTBEAT, "d": seq }).to_string()))
                    .await
                    .context("heartbeat")?;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let text = status.borrow_and_update().clone();
                if let Some(text) = text {
                    tx.send(Message::Text(presence_update(&text).to_string()))
                        .await
                        .context("presence update")?;
                }
            }
            msg = rx.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(target: "presence", ?frame, "gateway closed connection");
                        return Ok(());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e).context("gateway read"),
                    None => return Ok(()),
                };
                let payload: GatewayPayload = match serde_json::from_str(&text) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::debug!(target: "presence", error = %e, "unparsable gateway payload");
                        continue;
                    }
                };
                if payload.s.is_some() {
                    seq = payload.s;
                }
                match payload.op {
                    op::DISPATCH => {
                        if let Some(t) = payload.t.as_deref() {
                            if apply_dispatch(t, &payload.d, guilds) {
                                online.send_replace(true);
                                tracing::info!(target: "presence", guilds = guild_count(guilds), "gateway ready");
                            }
                        }
                    }
                    op::HEARTBEAT => {
                        tx.send(Message::Text(json!({ "op": op::HEARTBEAT, "d": seq }).to_string()))
                            .await
                            .context("heartbeat reply")?;
                    }
                    op::RECONNECT => return Ok(()),
                    op::INVALID_SESSION => bail!("gateway invalidated the session"),
                    op::HEARTBEAT_ACK => {}
                    other => tracing::trace!(target: "presence", op = other, "ignored gateway op"),
                }
            }
        }
    }
}

fn guild_count(guilds: &Guilds) -> usize {
    guilds.read().unwrap_or_else(PoisonError::into_inner).len()
}

/// Track guild membership from a dispatch event. Returns true on `READY`.
fn apply_dispatch(event: &str, d: &Value, guilds: &Guilds) -> bool {
    let id_of = |v: &Value| v.get("id").and_then(Value::as_str).and_then(|s| s.parse().ok());
    let mut set = guilds.write().unwrap_or_else(PoisonError::into_inner);
    match event {
        "READY" => {
            set.clear();
            if let Some(list) = d.get("guilds").and_then(Value::as_array) {
                set.extend(list.iter().filter_map(id_of));
            }
            true
        }
        "GUILD_CREATE" => {
            if let Some(id) = id_of(d) {
                set.insert(id);
            }
            false
        }
        "GUILD_DELETE" => {
            let outage = d.get("unavailable").and_then(Value::as_bool).unwrap_or(false);
            if let (Some(id), false) = (id_of(d), outage) {
                set.remove(&id);
            }
            false
        }
        _ => false,
    }
}

fn presence_body(status: Option<&str>) -> Value {
    let activities = match status {
        Some(text) => json!([{ "name": "custom", "type": 4, "state": text }]),
        None => json!([]),
    };
    json!({
        "since": Value::Null,
        "activities": activities,
        "status": "online",
        "afk": false,
    })
}

fn presence_update(status: &str) -> Value {
    json!({ "op": op::PRESENCE_UPDATE, "d": presence_body(Some(status)) })
}

fn identify_payload(token: &str, status: Option<&str>) -> Value {
    json!({
        "op": op::IDENTIFY,
        "d": {
            "token": token,
            "intents": INTENT_GUILDS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "pledge-pulse",
                "device": "pledge-pulse",
            },
            "presence": presence_body(status),
        }
    })
}
