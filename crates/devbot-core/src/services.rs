//! Contracts for the external services a task talks to.
//!
//! The orchestrator only sees these traits; `devbot-clients` provides the
//! HTTP implementations and tests provide in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Code host
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
    /// Blob sha, needed to update the file in place.
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    pub repo: String,
    pub branch: String,
    pub path: String,
    pub content: String,
    pub commit_message: String,
    pub title: String,
    pub body: String,
}

#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Fetch a file at `reference` (branch, tag or sha). `None` means the
    /// repository's default branch. Absent files yield `DevbotError::NotFound`.
    async fn fetch_file(&self, repo: &str, path: &str, reference: Option<&str>)
        -> Result<RepoFile>;

    /// Branch from the default branch, create or update `path` on the new
    /// branch, and open a pull request. Returns the pull request URL.
    async fn open_change(&self, change: &ChangeRequest) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Document wiki
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPage {
    pub id: String,
    pub title: String,
    /// Page body as plain text.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub space: String,
    pub excerpt: String,
    pub last_modified: String,
}

#[async_trait]
pub trait Wiki: Send + Sync {
    async fn create_page(
        &self,
        space: &str,
        title: &str,
        html_body: &str,
        parent_id: Option<&str>,
    ) -> Result<PageRef>;

    /// Fetch a page by numeric id or by any URL that embeds the id.
    async fn get_page(&self, page: &str) -> Result<WikiPage>;

    async fn search(&self, query: &str, space: Option<&str>) -> Result<Vec<SearchHit>>;
}

// ---------------------------------------------------------------------------
// Tool integration
// ---------------------------------------------------------------------------

/// A wiki operation executed through the remote tool endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Search {
        query: String,
        space: Option<String>,
    },
    GetPage {
        page_id: String,
    },
    CreatePage {
        space_key: String,
        title: String,
        /// Markdown; converted to storage HTML by whichever side writes the page.
        content: String,
        parent_id: Option<String>,
    },
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::Search { .. } => "confluence_search",
            ToolCall::GetPage { .. } => "confluence_get_page",
            ToolCall::CreatePage { .. } => "confluence_create_page",
        }
    }

    /// Arguments as sent in a `tools/call` request.
    pub fn arguments(&self) -> serde_json::Value {
        match self {
            ToolCall::Search { query, space } => {
                serde_json::json!({ "cql": crate::markup::cql(query, space.as_deref()) })
            }
            ToolCall::GetPage { page_id } => serde_json::json!({ "page_id": page_id }),
            ToolCall::CreatePage {
                space_key,
                title,
                content,
                parent_id,
            } => {
                let mut args = serde_json::json!({
                    "space_key": space_key,
                    "title": title,
                    "content": content,
                });
                if let Some(parent) = parent_id {
                    args["parent_id"] = serde_json::Value::String(parent.clone());
                }
                args
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    Search(Vec<SearchHit>),
    Page(WikiPage),
    Created(PageRef),
}

#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run_tool(&self, call: ToolCall) -> Result<ToolOutput>;
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post `text` to the callback `address`.
    async fn notify(&self, address: &str, text: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Services bundle
// ---------------------------------------------------------------------------

/// Knobs the task scripts need that are not part of any single service.
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub max_tokens: u32,
    pub default_space: String,
    /// Characters of generated code shown in the develop-from-design report.
    pub preview_chars: usize,
    /// Maximum search hits listed in a search report.
    pub max_search_hits: usize,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            default_space: "DEV".to_string(),
            preview_chars: 1500,
            max_search_hits: 10,
        }
    }
}

/// Long-lived service handles shared by every task.
///
/// `wiki` and `tools` are optional: when the wiki is not configured the
/// wiki-backed commands report that the integration is disabled, and when
/// the tool endpoint is not configured the tool-routed commands fall back to
/// their direct variants.
#[derive(Clone)]
pub struct Services {
    pub code_host: Arc<dyn CodeHost>,
    pub completion: Arc<dyn Completion>,
    pub wiki: Option<Arc<dyn Wiki>>,
    pub tools: Option<Arc<dyn ToolRunner>>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: TaskSettings,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("wiki", &self.wiki.is_some())
            .field("tools", &self.tools.is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
