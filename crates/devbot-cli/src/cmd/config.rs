use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use devbot_core::config::WarnLevel;
use devbot_server::supervisor::ConfigSource;

use crate::output::{print_fields, print_json};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Load the configuration and report problems
    Check,
}

pub fn run(source: &ConfigSource, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Check => check(source, json),
    }
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn enabled(on: bool) -> &'static str {
    if on {
        "enabled"
    } else {
        "disabled"
    }
}

fn check(source: &ConfigSource, json: bool) -> anyhow::Result<()> {
    let config = source.load().context("failed to load config")?;
    let warnings = config.validate();

    let wiki = config.confluence.credentials().is_some();
    let tools = wiki && config.mcp.url.is_some();
    let socket_mode = config.slack.app_token.is_some();
    let signed = config.slack.signing_secret.is_some();

    if json {
        print_json(&json!({
            "github_api_url": config.github.api_url,
            "model": config.anthropic.model,
            "wiki": wiki,
            "space_key": config.confluence.space_key,
            "tool_routing": tools,
            "socket_mode": socket_mode,
            "signature_verification": signed,
            "port": config.server.port,
            "warnings": warnings,
        }))?;
    } else {
        let port = config.server.port.to_string();
        print_fields(&[
            ("github", config.github.api_url.as_str()),
            ("model", config.anthropic.model.as_str()),
            ("wiki", enabled(wiki)),
            ("space", config.confluence.space_key.as_str()),
            ("tool routing", enabled(tools)),
            ("socket mode", enabled(socket_mode)),
            ("signatures", enabled(signed)),
            ("port", port.as_str()),
        ]);
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let errors = warnings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("configuration has {errors} error(s)");
    }
    Ok(())
}
