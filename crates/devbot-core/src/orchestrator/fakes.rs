//! In-memory service fakes for orchestrator tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{DevbotError, Result};
use crate::services::*;

// ---------------------------------------------------------------------------
// Code host
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeCodeHost {
    files: Mutex<HashMap<(String, String), String>>,
    fetch_error: Mutex<Option<String>>,
    open_error: Mutex<Option<String>>,
    opened: Mutex<Vec<ChangeRequest>>,
}

impl FakeCodeHost {
    pub const PR_URL: &'static str = "https://github.com/acme/widgets/pull/7";

    pub fn fail_fetch(&self, message: &str) {
        *self.fetch_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_open(&self, message: &str) {
        *self.open_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn opened(&self) -> Vec<ChangeRequest> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeHost for FakeCodeHost {
    async fn fetch_file(&self, repo: &str, path: &str, _reference: Option<&str>) -> Result<RepoFile> {
        if let Some(message) = self.fetch_error.lock().unwrap().clone() {
            return Err(DevbotError::service("github", message));
        }
        self.files
            .lock()
            .unwrap()
            .get(&(repo.to_string(), path.to_string()))
            .map(|content| RepoFile {
                path: path.to_string(),
                content: content.clone(),
                sha: "abc123".to_string(),
            })
            .ok_or_else(|| DevbotError::NotFound(format!("{repo}/{path}")))
    }

    async fn open_change(&self, change: &ChangeRequest) -> Result<String> {
        if let Some(message) = self.open_error.lock().unwrap().clone() {
            return Err(DevbotError::service("github", message));
        }
        self.opened.lock().unwrap().push(change.clone());
        Ok(Self::PR_URL.to_string())
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

enum Behaviour {
    Reply(String),
    Fail(String),
    Panic,
}

pub struct FakeCompletion {
    behaviour: Mutex<Behaviour>,
    prompts: Mutex<Vec<String>>,
}

impl Default for FakeCompletion {
    fn default() -> Self {
        Self {
            behaviour: Mutex::new(Behaviour::Reply(Self::REPLY.to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl FakeCompletion {
    pub const REPLY: &'static str = "# generated\nprint('hello')\n";

    pub fn set_reply(&self, reply: &str) {
        *self.behaviour.lock().unwrap() = Behaviour::Reply(reply.to_string());
    }

    pub fn fail(&self, message: &str) {
        *self.behaviour.lock().unwrap() = Behaviour::Fail(message.to_string());
    }

    pub fn panic_on_call(&self) {
        *self.behaviour.lock().unwrap() = Behaviour::Panic;
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completion for FakeCompletion {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = match &*self.behaviour.lock().unwrap() {
            Behaviour::Reply(text) => Some(Ok(text.clone())),
            Behaviour::Fail(message) => Some(Err(DevbotError::service("anthropic", message.clone()))),
            Behaviour::Panic => None,
        };
        match reply {
            Some(result) => result,
            None => panic!("completion exploded"),
        }
    }
}

// ---------------------------------------------------------------------------
// Wiki
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CreatedPage {
    pub space: String,
    pub title: String,
    pub body: String,
}

#[derive(Default)]
pub struct FakeWiki {
    created: Mutex<Vec<CreatedPage>>,
    fetched: Mutex<Vec<String>>,
    searches: Mutex<Vec<(String, Option<String>)>>,
    hits: Mutex<Vec<SearchHit>>,
}

impl FakeWiki {
    pub const PAGE_TEXT: &'static str = "JWTでログインする";

    pub fn created(&self) -> Vec<CreatedPage> {
        self.created.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn searches(&self) -> Vec<(String, Option<String>)> {
        self.searches.lock().unwrap().clone()
    }

    pub fn set_hits(&self, hits: Vec<SearchHit>) {
        *self.hits.lock().unwrap() = hits;
    }
}

#[async_trait]
impl Wiki for FakeWiki {
    async fn create_page(
        &self,
        space: &str,
        title: &str,
        html_body: &str,
        _parent_id: Option<&str>,
    ) -> Result<PageRef> {
        self.created.lock().unwrap().push(CreatedPage {
            space: space.to_string(),
            title: title.to_string(),
            body: html_body.to_string(),
        });
        Ok(PageRef {
            id: "1001".into(),
            title: title.to_string(),
            url: format!("https://wiki.test/spaces/{space}/pages/1001"),
        })
    }

    async fn get_page(&self, page: &str) -> Result<WikiPage> {
        self.fetched.lock().unwrap().push(page.to_string());
        Ok(WikiPage {
            id: "123456".into(),
            title: "ユーザー認証 設計書".into(),
            text: Self::PAGE_TEXT.into(),
        })
    }

    async fn search(&self, query: &str, space: Option<&str>) -> Result<Vec<SearchHit>> {
        self.searches
            .lock()
            .unwrap()
            .push((query.to_string(), space.map(str::to_string)));
        Ok(self.hits.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Tool runner
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTools {
    calls: Mutex<Vec<ToolCall>>,
}

impl FakeTools {
    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolRunner for FakeTools {
    async fn run_tool(&self, call: ToolCall) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(call.clone());
        Ok(match call {
            ToolCall::Search { .. } => ToolOutput::Search(Vec::new()),
            ToolCall::GetPage { page_id } => ToolOutput::Page(WikiPage {
                id: page_id,
                title: "設計書".into(),
                text: FakeWiki::PAGE_TEXT.into(),
            }),
            ToolCall::CreatePage {
                space_key, title, ..
            } => ToolOutput::Created(PageRef {
                id: "2002".into(),
                url: format!("https://wiki.test/spaces/{space_key}/pages/2002"),
                title,
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(address, _)| address.clone())
            .collect()
    }

    pub fn fail_all(&self) {
        *self.failing.lock().unwrap() = true;
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, address: &str, text: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((address.to_string(), text.to_string()));
        if *self.failing.lock().unwrap() {
            return Err(DevbotError::service("callback", "connection refused"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub code_host: Arc<FakeCodeHost>,
    pub completion: Arc<FakeCompletion>,
    pub wiki: Option<Arc<FakeWiki>>,
    pub tools: Option<Arc<FakeTools>>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            code_host: Arc::default(),
            completion: Arc::default(),
            wiki: None,
            tools: None,
            notifier: Arc::default(),
        }
    }

    pub fn with_file(self, repo: &str, path: &str, content: &str) -> Self {
        self.code_host
            .files
            .lock()
            .unwrap()
            .insert((repo.to_string(), path.to_string()), content.to_string());
        self
    }

    pub fn with_wiki(mut self) -> Self {
        self.wiki = Some(Arc::default());
        self
    }

    pub fn with_tools(mut self) -> Self {
        self.tools = Some(Arc::default());
        self
    }

    pub fn services(&self) -> Services {
        Services {
            code_host: self.code_host.clone(),
            completion: self.completion.clone(),
            wiki: self.wiki.clone().map(|w| w as Arc<dyn Wiki>),
            tools: self.tools.clone().map(|t| t as Arc<dyn ToolRunner>),
            notifier: self.notifier.clone(),
            settings: TaskSettings::default(),
        }
    }
}
