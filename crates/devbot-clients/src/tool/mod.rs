//! Client for the remote Atlassian tool-integration endpoint.
//!
//! Every call goes through a session negotiated once per client. The
//! session state moves `Unbound -> Bound` on a successful negotiation and
//! `Unbound -> Degraded` on any failure; `Degraded` is final and all later
//! calls go straight to the direct wiki adapter. A bound call that fails is
//! retried exactly once through the direct adapter, and that attempt's
//! result is returned as-is.

mod stream;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use devbot_core::config::ConfluenceCredentials;
use devbot_core::markup;
use devbot_core::services::{
    PageRef, SearchHit, ToolCall, ToolOutput, ToolRunner, Wiki, WikiPage,
};
use devbot_core::{DevbotError, Result};

use crate::error::{check, decode, transport};
use stream::DataLines;

const SERVICE: &str = "tool";

// ─── Session state ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unbound,
    Bound { id: String },
    Degraded,
}

// ─── ToolClient ───────────────────────────────────────────────────────────

pub struct ToolClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    credentials: ConfluenceCredentials,
    fallback: Arc<dyn Wiki>,
    /// Nominal session lifetime; logged, not enforced.
    session_timeout: Duration,
    session: Mutex<SessionState>,
}

impl ToolClient {
    pub fn new(
        client: Client,
        endpoint: &str,
        api_key: Option<String>,
        credentials: ConfluenceCredentials,
        fallback: Arc<dyn Wiki>,
        session_timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| DevbotError::Config(format!("invalid tool endpoint '{endpoint}': {e}")))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            credentials,
            fallback,
            session_timeout,
            session: Mutex::new(SessionState::Unbound),
        })
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.clone()
    }

    /// `sessions` resolved against the endpoint, i.e. a sibling of its last
    /// path segment.
    fn sessions_url(&self) -> Result<Url> {
        self.endpoint
            .join("sessions")
            .map_err(|e| DevbotError::Config(format!("cannot derive sessions url: {e}")))
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Negotiate on first use. Returns the session id, or `None` once the
    /// client is degraded. Negotiation is serialized behind the lock, so
    /// concurrent first calls negotiate only once.
    async fn ensure_session(&self) -> Option<String> {
        let mut session = self.session.lock().await;
        match &*session {
            SessionState::Bound { id } => return Some(id.clone()),
            SessionState::Degraded => return None,
            SessionState::Unbound => {}
        }

        match self.negotiate().await {
            Ok(id) => {
                info!(
                    session = %id,
                    timeout_secs = self.session_timeout.as_secs(),
                    "tool session established"
                );
                *session = SessionState::Bound { id: id.clone() };
                Some(id)
            }
            Err(e) => {
                warn!(error = %e, "tool session negotiation failed, using direct wiki access from now on");
                *session = SessionState::Degraded;
                None
            }
        }
    }

    async fn negotiate(&self) -> Result<String> {
        let response = self
            .authed(self.client.post(self.sessions_url()?))
            .json(&json!({
                "confluence_url": self.credentials.url,
                "username": self.credentials.username,
                "api_token": self.credentials.api_token,
            }))
            .send()
            .await
            .map_err(|e| transport(SERVICE, e))?;
        let body: Value = check(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| decode(SERVICE, "session", e))?;
        body.get("session_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| DevbotError::service(SERVICE, "session response has no session_id"))
    }

    /// One `tools/call` over the event stream. Reads `data:` lines until an
    /// event carrying our request id arrives.
    async fn call_remote(&self, session_id: &str, call: &ToolCall) -> Result<ToolOutput> {
        let request_id = Uuid::new_v4().to_string();
        let response = self
            .authed(self.client.post(self.endpoint.clone()))
            .header("Accept", "text/event-stream")
            .header("X-Session-ID", session_id)
            .json(&json!({
                "id": request_id,
                "method": "tools/call",
                "params": { "name": call.name(), "arguments": call.arguments() },
            }))
            .send()
            .await
            .map_err(|e| transport(SERVICE, e))?;
        let response = check(SERVICE, response).await?;

        let mut lines = DataLines::default();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| transport(SERVICE, e))?;
            for data in lines.push(&chunk) {
                if let Some(result) = match_event(&request_id, &data) {
                    return decode_output(call, result?);
                }
            }
        }
        if let Some(data) = lines.finish() {
            if let Some(result) = match_event(&request_id, &data) {
                return decode_output(call, result?);
            }
        }
        Err(DevbotError::service(
            SERVICE,
            format!("no response for {} before the stream ended", call.name()),
        ))
    }

    /// The same operation against the wiki REST API.
    async fn call_direct(&self, call: ToolCall) -> Result<ToolOutput> {
        match call {
            ToolCall::Search { query, space } => self
                .fallback
                .search(&query, space.as_deref())
                .await
                .map(ToolOutput::Search),
            ToolCall::GetPage { page_id } => {
                self.fallback.get_page(&page_id).await.map(ToolOutput::Page)
            }
            ToolCall::CreatePage {
                space_key,
                title,
                content,
                parent_id,
            } => {
                let html = markup::markdown_to_html(&content);
                self.fallback
                    .create_page(&space_key, &title, &html, parent_id.as_deref())
                    .await
                    .map(ToolOutput::Created)
            }
        }
    }
}

#[async_trait]
impl ToolRunner for ToolClient {
    async fn run_tool(&self, call: ToolCall) -> Result<ToolOutput> {
        let Some(session_id) = self.ensure_session().await else {
            debug!(tool = call.name(), "session degraded, calling wiki directly");
            return self.call_direct(call).await;
        };
        match self.call_remote(&session_id, &call).await {
            Ok(output) => Ok(output),
            Err(e) => {
                warn!(tool = call.name(), error = %e, "remote tool call failed, retrying directly");
                self.call_direct(call).await
            }
        }
    }
}

// ─── Event decoding ───────────────────────────────────────────────────────

/// `None` when the line is not an event for `request_id`; otherwise the
/// event's `result`, or its `error` as a failure.
fn match_event(request_id: &str, data: &str) -> Option<Result<Value>> {
    let event: Value = serde_json::from_str(data).ok()?;
    if event.get("id").and_then(Value::as_str) != Some(request_id) {
        return None;
    }
    if let Some(error) = event.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Some(Err(DevbotError::service(SERVICE, message)));
    }
    Some(
        event
            .get("result")
            .cloned()
            .ok_or_else(|| DevbotError::service(SERVICE, "event has neither result nor error")),
    )
}

fn text_field(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn decode_output(call: &ToolCall, result: Value) -> Result<ToolOutput> {
    match call {
        ToolCall::Search { .. } => {
            let items = result
                .get("results")
                .and_then(Value::as_array)
                .or_else(|| result.as_array())
                .ok_or_else(|| decode(SERVICE, "search", "missing results"))?;
            let hits = items
                .iter()
                .map(|item| SearchHit {
                    title: text_field(item, &["title"]),
                    url: text_field(item, &["url"]),
                    space: item
                        .get("space")
                        .and_then(|s| s.as_str().or_else(|| s.get("name").and_then(Value::as_str)))
                        .unwrap_or_default()
                        .to_string(),
                    excerpt: text_field(item, &["excerpt"]),
                    last_modified: text_field(item, &["last_modified", "lastModified"]),
                })
                .collect();
            Ok(ToolOutput::Search(hits))
        }
        ToolCall::GetPage { page_id } => {
            let content = text_field(&result, &["content"]);
            let id = text_field(&result, &["page_id", "id"]);
            Ok(ToolOutput::Page(WikiPage {
                id: if id.is_empty() { page_id.clone() } else { id },
                title: text_field(&result, &["title"]),
                text: markup::html_to_text(&content),
            }))
        }
        ToolCall::CreatePage { title, .. } => {
            let url = text_field(&result, &["page_url", "url"]);
            if url.is_empty() {
                return Err(decode(SERVICE, "create page", "missing page_url"));
            }
            let returned_title = text_field(&result, &["title"]);
            Ok(ToolOutput::Created(PageRef {
                id: text_field(&result, &["page_id", "id"]),
                title: if returned_title.is_empty() {
                    title.clone()
                } else {
                    returned_title
                },
                url,
            }))
        }
    }
}

#[cfg(test)]
mod tests;
