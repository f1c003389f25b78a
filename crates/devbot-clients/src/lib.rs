//! `devbot-clients`: HTTP implementations of the `devbot-core` service
//! traits.
//!
//! ```text
//! Config ──build_services──▶ Services
//!                              ├─ code_host   GitHub        (REST v3)
//!                              ├─ completion  Anthropic     (Messages API)
//!                              ├─ wiki        Confluence    (REST, optional)
//!                              ├─ tools       ToolClient    (session + SSE, optional,
//!                              │                             falls back to `wiki`)
//!                              └─ notifier    ResponseUrlNotifier
//! ```
//!
//! All adapters share one `reqwest::Client`.

pub mod anthropic;
pub mod confluence;
mod error;
pub mod github;
pub mod notify;
pub mod tool;

use std::sync::Arc;
use std::time::Duration;

use devbot_core::config::Config;
use devbot_core::services::{Services, TaskSettings, ToolRunner, Wiki};
use devbot_core::{DevbotError, Result};
use tracing::{info, warn};

pub use anthropic::Anthropic;
pub use confluence::Confluence;
pub use github::GitHub;
pub use notify::ResponseUrlNotifier;
pub use tool::{SessionState, ToolClient};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// The HTTP client shared by every adapter.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("devbot/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| DevbotError::Config(format!("cannot build http client: {e}")))
}

/// Construct every adapter `config` enables.
///
/// The wiki is present only with complete Confluence credentials. The tool
/// client additionally needs `mcp.url`, and is never built without the wiki
/// because the wiki is its fallback.
pub fn build_services(config: &Config) -> Result<Services> {
    let client = http_client()?;

    let wiki: Option<Arc<dyn Wiki>> = config
        .confluence
        .credentials()
        .map(|creds| Arc::new(Confluence::new(client.clone(), creds)) as Arc<dyn Wiki>);

    let tools: Option<Arc<dyn ToolRunner>> = match (&config.mcp.url, &wiki) {
        (Some(url), Some(fallback)) => {
            let creds = config
                .confluence
                .credentials()
                .ok_or_else(|| DevbotError::Config("confluence credentials vanished".into()))?;
            Some(Arc::new(ToolClient::new(
                client.clone(),
                url,
                config.mcp.api_key.clone(),
                creds,
                fallback.clone(),
                Duration::from_secs(config.mcp.session_timeout_secs),
            )?))
        }
        (Some(_), None) => {
            warn!("mcp.url is set without confluence credentials; tool routing disabled");
            None
        }
        (None, _) => None,
    };

    info!(
        wiki = wiki.is_some(),
        tools = tools.is_some(),
        model = %config.anthropic.model,
        "services built"
    );

    Ok(Services {
        code_host: Arc::new(GitHub::new(
            client.clone(),
            &config.github.api_url,
            &config.github.token,
        )),
        completion: Arc::new(Anthropic::new(
            client.clone(),
            &config.anthropic.api_url,
            &config.anthropic.api_key,
            &config.anthropic.model,
        )),
        wiki,
        tools,
        notifier: Arc::new(ResponseUrlNotifier::new(client)),
        settings: TaskSettings {
            max_tokens: config.anthropic.max_tokens,
            default_space: config.confluence.space_key.clone(),
            ..TaskSettings::default()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    const BASE: [(&str, &str); 2] = [("GITHUB_ACCESS_TOKEN", "ghp"), ("ANTHROPIC_API_KEY", "sk")];

    #[test]
    fn minimal_config_has_no_wiki_or_tools() {
        let services = build_services(&config(&BASE)).unwrap();
        assert!(services.wiki.is_none());
        assert!(services.tools.is_none());
        assert_eq!(services.settings.default_space, "DEV");
        assert_eq!(services.settings.max_tokens, 4096);
    }

    #[test]
    fn tools_require_wiki() {
        let mut pairs = BASE.to_vec();
        pairs.push(("ATLASSIAN_MCP_URL", "https://mcp.atlassian.com/v1/sse"));
        let services = build_services(&config(&pairs)).unwrap();
        assert!(services.tools.is_none());

        pairs.extend([
            ("CONFLUENCE_URL", "https://x.atlassian.net/wiki"),
            ("CONFLUENCE_USERNAME", "me"),
            ("CONFLUENCE_API_TOKEN", "t"),
            ("CONFLUENCE_SPACE_KEY", "ENG"),
        ]);
        let services = build_services(&config(&pairs)).unwrap();
        assert!(services.wiki.is_some());
        assert!(services.tools.is_some());
        assert_eq!(services.settings.default_space, "ENG");
    }

    #[test]
    fn invalid_tool_endpoint_fails_build() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("ATLASSIAN_MCP_URL", "::nope::"),
            ("CONFLUENCE_URL", "https://x.atlassian.net/wiki"),
            ("CONFLUENCE_USERNAME", "me"),
            ("CONFLUENCE_API_TOKEN", "t"),
        ]);
        assert!(matches!(
            build_services(&config(&pairs)),
            Err(DevbotError::Config(_))
        ));
    }
}
