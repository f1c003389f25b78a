use crate::error::{DevbotError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// GithubConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub token: String,
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

// ---------------------------------------------------------------------------
// AnthropicConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_anthropic_api_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-3-5-sonnet-20240620".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

// ---------------------------------------------------------------------------
// ConfluenceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfluenceConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_space_key")]
    pub space_key: String,
}

fn default_space_key() -> String {
    "DEV".to_string()
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            api_token: None,
            space_key: default_space_key(),
        }
    }
}

/// The complete set of values needed to talk to the wiki.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfluenceCredentials {
    pub url: String,
    pub username: String,
    pub api_token: String,
}

impl ConfluenceConfig {
    /// `Some` only when url, username and token are all present.
    pub fn credentials(&self) -> Option<ConfluenceCredentials> {
        Some(ConfluenceCredentials {
            url: self.url.clone()?.trim_end_matches('/').to_string(),
            username: self.username.clone()?,
            api_token: self.api_token.clone()?,
        })
    }

    fn is_partial(&self) -> bool {
        let set = [&self.url, &self.username, &self.api_token]
            .iter()
            .filter(|v| v.is_some())
            .count();
        set > 0 && set < 3
    }
}

// ---------------------------------------------------------------------------
// McpConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Nominal session lifetime. Recorded, not enforced.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
}

fn default_session_timeout() -> u64 {
    300
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            session_timeout_secs: default_session_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// SlackConfig / ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(default)]
    pub signing_secret: Option<String>,
    /// App-level token (`xapp-...`) enabling the Socket Mode connection.
    #[serde(default)]
    pub app_token: Option<String>,
    #[serde(default = "default_slack_api_url")]
    pub api_url: String,
}

fn default_slack_api_url() -> String {
    "https://slack.com/api".to_string()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            app_token: None,
            api_url: default_slack_api_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Delay before the relay is initialised, so the health endpoint is
    /// reachable first.
    #[serde(default = "default_startup_delay")]
    pub startup_delay_ms: u64,
}

fn default_port() -> u16 {
    8080
}

fn default_startup_delay() -> u64 {
    2000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            startup_delay_ms: default_startup_delay(),
        }
    }
}

impl ServerConfig {
    /// Listener settings from `PORT` alone. The credential variables are
    /// not consulted, so the listener can come up without them.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("PORT")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Ok(Self {
            port: parse_number("PORT", port)?.unwrap_or_else(default_port),
            startup_delay_ms: default_startup_delay(),
        })
    }

    /// Read only the `server:` section of a config file; the other sections
    /// may be missing or invalid.
    pub fn load(path: &Path) -> Result<Self> {
        #[derive(Deserialize)]
        struct ServerSection {
            #[serde(default)]
            server: ServerConfig,
        }

        let data = std::fs::read_to_string(path)?;
        let section: ServerSection = serde_yaml::from_str(&data)?;
        Ok(section.server)
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub github: GithubConfig,
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub confluence: ConfluenceConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source. Values are
    /// trimmed and blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            get(key).ok_or_else(|| DevbotError::Config(format!("{key} is not set")))
        };

        Ok(Config {
            github: GithubConfig {
                token: required("GITHUB_ACCESS_TOKEN")?,
                api_url: get("GITHUB_API_URL").unwrap_or_else(default_github_api_url),
            },
            anthropic: AnthropicConfig {
                api_key: required("ANTHROPIC_API_KEY")?,
                api_url: get("ANTHROPIC_API_URL").unwrap_or_else(default_anthropic_api_url),
                model: get("ANTHROPIC_MODEL").unwrap_or_else(default_model),
                max_tokens: parse_number("ANTHROPIC_MAX_TOKENS", get("ANTHROPIC_MAX_TOKENS"))?
                    .unwrap_or_else(default_max_tokens),
            },
            confluence: ConfluenceConfig {
                url: get("CONFLUENCE_URL"),
                username: get("CONFLUENCE_USERNAME"),
                api_token: get("CONFLUENCE_API_TOKEN"),
                space_key: get("CONFLUENCE_SPACE_KEY").unwrap_or_else(default_space_key),
            },
            mcp: McpConfig {
                url: get("ATLASSIAN_MCP_URL"),
                api_key: get("ATLASSIAN_MCP_API_KEY"),
                session_timeout_secs: default_session_timeout(),
            },
            slack: SlackConfig {
                signing_secret: get("SLACK_SIGNING_SECRET"),
                app_token: get("SLACK_APP_TOKEN"),
                api_url: get("SLACK_API_URL").unwrap_or_else(default_slack_api_url),
            },
            server: ServerConfig::from_lookup(&lookup)?,
        })
    }

    /// Load a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&data)?;
        cfg.normalize();
        if cfg.github.token.is_empty() {
            return Err(DevbotError::Config("github.token is empty".into()));
        }
        if cfg.anthropic.api_key.is_empty() {
            return Err(DevbotError::Config("anthropic.api_key is empty".into()));
        }
        Ok(cfg)
    }

    fn normalize(&mut self) {
        fn trim(value: &mut String) {
            *value = value.trim().to_string();
        }
        fn trim_opt(value: &mut Option<String>) {
            *value = value
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        trim(&mut self.github.token);
        trim(&mut self.anthropic.api_key);
        trim(&mut self.confluence.space_key);
        trim_opt(&mut self.confluence.url);
        trim_opt(&mut self.confluence.username);
        trim_opt(&mut self.confluence.api_token);
        trim_opt(&mut self.mcp.url);
        trim_opt(&mut self.mcp.api_key);
        trim_opt(&mut self.slack.signing_secret);
        trim_opt(&mut self.slack.app_token);
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.confluence.is_partial() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "confluence is partially configured; url, username and api_token \
                          are all required, wiki commands are disabled"
                    .to_string(),
            });
        }

        if self.mcp.url.is_some() && self.confluence.credentials().is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "mcp.url is set but confluence is not configured; \
                          tool-routed commands have no fallback and are disabled"
                    .to_string(),
            });
        }

        if self.slack.signing_secret.is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "slack.signing_secret is not set; inbound requests are not verified"
                    .to_string(),
            });
        }

        if self.confluence.space_key.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "confluence.space_key is empty".to_string(),
            });
        }

        if self.anthropic.max_tokens == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "anthropic.max_tokens must be greater than zero".to_string(),
            });
        }

        warnings
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| DevbotError::Config(format!("{key} is not a valid number: '{v}'")))
        })
        .transpose()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
