//! Slack Socket Mode: the same slash commands delivered over a websocket
//! instead of HTTP.
//!
//! `apps.connections.open` (authorised with the app-level token) returns a
//! single-use `wss://` URL. Every envelope Slack pushes must be acknowledged
//! by echoing its `envelope_id`; for `slash_commands` the ack carries the
//! same text the HTTP endpoint replies with. A `disconnect` envelope, a
//! closed socket or a failed open all lead to a fresh connection.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use devbot_core::Services;

use crate::dispatch::{self, SlashCommand};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

// ─── Envelopes ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    reason: Option<String>,
}

/// A decoded websocket frame.
#[derive(Debug)]
pub enum Frame {
    Hello,
    Command {
        envelope_id: String,
        command: SlashCommand,
    },
    Disconnect {
        reason: String,
    },
    /// A slash command envelope whose payload could not be read. It is
    /// still acknowledged so Slack does not redeliver it.
    Rejected {
        envelope_id: String,
        error: String,
    },
    /// Anything else; acknowledged when it carries an envelope id.
    Other {
        kind: String,
        envelope_id: Option<String>,
    },
}

pub fn decode_frame(text: &str) -> serde_json::Result<Frame> {
    let RawEnvelope {
        kind,
        envelope_id,
        payload,
        reason,
    } = serde_json::from_str(text)?;
    Ok(match (kind.as_str(), envelope_id, payload) {
        ("hello", ..) => Frame::Hello,
        ("disconnect", ..) => Frame::Disconnect {
            reason: reason.unwrap_or_default(),
        },
        ("slash_commands", Some(envelope_id), payload) => {
            let payload = payload.unwrap_or(Value::Null);
            match serde_json::from_value(payload) {
                Ok(command) => Frame::Command {
                    envelope_id,
                    command,
                },
                Err(e) => Frame::Rejected {
                    envelope_id,
                    error: e.to_string(),
                },
            }
        }
        (_, envelope_id, _) => Frame::Other {
            kind: kind.clone(),
            envelope_id,
        },
    })
}

/// What the session does with one frame.
#[derive(Debug, PartialEq)]
enum Reply {
    /// Send this ack frame.
    Ack(String),
    Reconnect,
    Ignore,
}

/// Decide the response to `frame`; `accept` dispatches a decoded slash
/// command and returns the text for its ack.
fn reply_to(frame: Frame, accept: impl FnOnce(SlashCommand) -> String) -> Reply {
    match frame {
        Frame::Hello => {
            debug!("socket mode hello");
            Reply::Ignore
        }
        Frame::Disconnect { reason } => {
            info!(reason = %reason, "slack requested reconnect");
            Reply::Reconnect
        }
        Frame::Command {
            envelope_id,
            command,
        } => Reply::Ack(ack(&envelope_id, Some(accept(command)))),
        Frame::Rejected { envelope_id, error } => {
            warn!(envelope_id = %envelope_id, error = %error, "unreadable slash command payload");
            let text = format!("❌ スラッシュコマンドを読み取れませんでした: {error}");
            Reply::Ack(ack(&envelope_id, Some(text)))
        }
        Frame::Other {
            kind,
            envelope_id: Some(envelope_id),
        } => {
            debug!(kind = %kind, "acknowledging unhandled envelope");
            Reply::Ack(ack(&envelope_id, None))
        }
        Frame::Other { .. } => Reply::Ignore,
    }
}

fn ack(envelope_id: &str, text: Option<String>) -> String {
    let body = match text {
        Some(text) => json!({ "envelope_id": envelope_id, "payload": { "text": text } }),
        None => json!({ "envelope_id": envelope_id }),
    };
    body.to_string()
}

// ─── Connection ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct OpenResponse {
    ok: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Ask Slack for a single-use websocket URL.
pub async fn open_connection(
    client: &reqwest::Client,
    api_url: &str,
    app_token: &str,
) -> anyhow::Result<String> {
    let response: OpenResponse = client
        .post(format!("{api_url}/apps.connections.open"))
        .bearer_auth(app_token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    match (response.ok, response.url) {
        (true, Some(url)) => Ok(url),
        _ => anyhow::bail!(
            "slack refused the connection: {}",
            response.error.as_deref().unwrap_or("no url returned")
        ),
    }
}

pub struct SocketMode {
    client: reqwest::Client,
    api_url: String,
    app_token: String,
    services: Arc<Services>,
}

impl SocketMode {
    pub fn new(
        client: reqwest::Client,
        api_url: &str,
        app_token: impl Into<String>,
        services: Arc<Services>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            app_token: app_token.into(),
            services,
        }
    }

    /// Keep a connection open forever, reconnecting after every drop.
    pub async fn run(self) {
        loop {
            match open_connection(&self.client, &self.api_url, &self.app_token).await {
                Ok(url) => match self.session(&url).await {
                    Ok(()) => info!("socket mode connection closed, reconnecting"),
                    Err(e) => warn!(error = %e, "socket mode connection failed"),
                },
                Err(e) => warn!(error = %e, "apps.connections.open failed"),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    /// Serve one websocket until Slack closes it or asks us to reconnect.
    async fn session(&self, url: &str) -> anyhow::Result<()> {
        let (mut ws, _) = tokio_tungstenite::connect_async(url).await?;
        info!("socket mode connected");

        while let Some(message) = ws.next().await {
            let text = match message? {
                Message::Text(text) => text,
                Message::Close(_) => return Ok(()),
                _ => continue,
            };
            let frame = match decode_frame(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "undecodable socket mode frame");
                    continue;
                }
            };
            match reply_to(frame, |command| self.accept(command)) {
                Reply::Ack(body) => ws.send(Message::Text(body)).await?,
                Reply::Reconnect => return Ok(()),
                Reply::Ignore => {}
            }
        }
        Ok(())
    }

    /// Dispatch a slash command; returns the ack text for the user.
    fn accept(&self, command: SlashCommand) -> String {
        info!(command = %command.command, user = %command.user_name, "slash command received over socket");
        let reply = dispatch::ack_text(&command.text);
        match command.into_command() {
            Ok(command) => {
                let handle = dispatch::spawn(self.services.clone(), command);
                info!(task = %handle.id, "task dispatched");
                reply
            }
            Err(e) => {
                warn!(error = %e, "slash command rejected");
                format!("❌ {e}")
            }
        }
    }
}
