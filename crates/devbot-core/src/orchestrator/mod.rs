//! Task orchestration.
//!
//! Every command kind maps to a fixed, linear script of service calls. A
//! script reports progress to the command's callback address after each
//! step and ends with exactly one final message: the success notice carrying
//! the artifact, or a failure notice. [`execute`] owns that final message so
//! no script can terminate silently, including by panicking.

mod develop;
mod design;
mod from_design;
mod search;
mod wiki;

#[cfg(test)]
mod fakes;

use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

use crate::command::{Command, CommandKind, Route};
use crate::error::DevbotError;
use crate::services::{Notifier, Services};

pub use develop::branch_name;

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// What a successful task produced. The artifact itself lives in the
/// external service; this is only a reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    PullRequest { url: String, branch: String },
    Page { url: String, title: String },
    GeneratedCode { path: String, preview: String },
    SearchResults { count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded(Artifact),
    /// The reason exactly as it was reported to the user.
    Failed(String),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_))
    }
}

/// Final success of a script: the artifact plus the message announcing it.
struct Finished {
    artifact: Artifact,
    message: String,
}

/// A failure already phrased for the user.
#[derive(Debug)]
struct Failure(String);

type Step<T> = std::result::Result<T, Failure>;

const UNEXPECTED: &str = "予期せぬエラーが発生しました。詳細はログを確認してください。";

fn usage_hint(usage: &str) -> String {
    format!("コマンドの形式が正しくありません。\n例: `{usage}`")
}

const WIKI_DISABLED: &str = "❌ Confluence連携が無効です。\
CONFLUENCE_URL、CONFLUENCE_USERNAME、CONFLUENCE_API_TOKEN を設定してください。";

/// Phrase a pre-flight error for the user: a malformed command gets the
/// usage hint, a missing integration gets the setup notice, anything else
/// is reported verbatim.
fn user_failure(err: DevbotError) -> Failure {
    match err {
        DevbotError::MalformedCommand { usage, .. } => Failure(usage_hint(usage)),
        DevbotError::Disabled(_) => Failure(WIKI_DISABLED.to_string()),
        other => Failure(format!("❌ {other}")),
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

/// Posts progress messages to one callback address.
///
/// Delivery failures are logged and swallowed: the callback is the only
/// channel back to the user, so there is nowhere else to report them.
struct Reporter<'a> {
    notifier: &'a dyn Notifier,
    address: &'a str,
}

impl<'a> Reporter<'a> {
    fn new(notifier: &'a dyn Notifier, address: &'a str) -> Self {
        Self { notifier, address }
    }

    async fn send(&self, text: &str) {
        if let Err(e) = self.notifier.notify(self.address, text).await {
            warn!(address = %self.address, error = %e, "callback delivery failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// The kind that will actually run. Tool-routed kinds fall back to their
/// direct variant when no tool-integration client is configured.
pub fn effective_kind(services: &Services, kind: CommandKind) -> CommandKind {
    if kind.route() == Route::Tool && services.tools.is_none() {
        kind.direct()
    } else {
        kind
    }
}

/// Run one command to completion and report its result.
pub async fn execute(services: &Services, command: &Command) -> TaskOutcome {
    let reporter = Reporter::new(services.notifier.as_ref(), &command.callback);
    let kind = effective_kind(services, command.kind);
    if kind != command.kind {
        info!(requested = %command.kind, running = %kind, "tool integration not configured, using direct variant");
    }
    info!(kind = %kind, text = %command.text, "task started");

    let script = AssertUnwindSafe(run_script(services, kind, &command.text, &reporter));
    match script.catch_unwind().await {
        Ok(Ok(finished)) => {
            info!(kind = %kind, artifact = ?finished.artifact, "task succeeded");
            reporter.send(&finished.message).await;
            TaskOutcome::Succeeded(finished.artifact)
        }
        Ok(Err(Failure(message))) => {
            warn!(kind = %kind, reason = %message, "task failed");
            reporter.send(&message).await;
            TaskOutcome::Failed(message)
        }
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            error!(kind = %kind, panic = %detail, "task panicked");
            reporter.send(UNEXPECTED).await;
            TaskOutcome::Failed(UNEXPECTED.to_string())
        }
    }
}

async fn run_script(
    services: &Services,
    kind: CommandKind,
    text: &str,
    reporter: &Reporter<'_>,
) -> Step<Finished> {
    let via = kind.route();
    match kind.direct() {
        CommandKind::Develop => develop::run(services, text, reporter).await,
        CommandKind::Design => design::run(services, via, text, reporter).await,
        CommandKind::DevelopFromDesign => from_design::run(services, via, text, reporter).await,
        _ => search::run(services, via, text, reporter).await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
