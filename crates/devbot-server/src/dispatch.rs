//! Acknowledge-then-run: the inbound side of every slash command.
//!
//! HTTP and Socket Mode both decode a [`SlashCommand`], answer Slack with
//! [`ack_text`] inside its three-second window and hand the command to
//! [`spawn`], which runs the task script on a detached tokio task.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use devbot_core::{execute, Command, Services, TaskOutcome};

/// Slash-command fields shared by the form post and the Socket Mode payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SlashCommand {
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub response_url: String,
    #[serde(default)]
    pub user_name: String,
}

impl SlashCommand {
    pub fn into_command(self) -> devbot_core::Result<Command> {
        Command::from_slash(&self.command, self.text, self.response_url)
    }
}

/// A running task. Dropping it detaches the task.
#[derive(Debug)]
pub struct TaskHandle {
    pub id: Uuid,
    join: JoinHandle<TaskOutcome>,
}

impl TaskHandle {
    /// Wait for the task script to finish.
    pub async fn outcome(self) -> Result<TaskOutcome, JoinError> {
        self.join.await
    }
}

pub fn ack_text(text: &str) -> String {
    format!("指示を受け付けました: `{text}`\nバックグラウンドで開発タスクを開始します...")
}

/// An ephemeral reply, visible only to the invoking user.
pub fn ephemeral(text: impl Into<String>) -> Value {
    json!({ "response_type": "ephemeral", "text": text.into() })
}

/// Run `command` in the background.
pub fn spawn(services: Arc<Services>, command: Command) -> TaskHandle {
    let id = Uuid::new_v4();
    let span = info_span!("task", %id, kind = %command.kind);
    let join = tokio::spawn(
        async move {
            info!("task started");
            let outcome = execute(&services, &command).await;
            info!(success = outcome.is_success(), "task finished");
            outcome
        }
        .instrument(span),
    );
    TaskHandle { id, join }
}
