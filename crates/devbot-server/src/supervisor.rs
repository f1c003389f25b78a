//! Process topology: the health endpoint is mandatory, the relay is best
//! effort.
//!
//! The listener starts serving immediately. Relay initialisation (config,
//! adapters, the optional Socket Mode connection) runs on its own task after
//! a delay; whatever happens to that task is logged and `/health` keeps
//! answering.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use devbot_core::config::{Config, ServerConfig, WarnLevel};

use crate::socket::SocketMode;
use crate::state::{AppState, Relay};

/// Where the relay reads its configuration from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    Env,
    File(PathBuf),
}

impl ConfigSource {
    pub fn load(&self) -> devbot_core::Result<Config> {
        match self {
            ConfigSource::Env => Config::from_env(),
            ConfigSource::File(path) => Config::load(path),
        }
    }

    /// Listener settings, read before the relay exists and without the
    /// credential sections. An unreadable `server` section falls back to
    /// defaults; the relay reports config errors once it initialises.
    pub fn server_settings(&self) -> ServerConfig {
        let settings = match self {
            ConfigSource::Env => ServerConfig::from_lookup(|key| std::env::var(key).ok()),
            ConfigSource::File(path) => ServerConfig::load(path),
        };
        settings.unwrap_or_else(|e| {
            warn!(error = %e, "unreadable server settings, using defaults");
            ServerConfig::default()
        })
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub source: ConfigSource,
    pub startup_delay: Duration,
}

/// Serve on `listener` and bring the relay up in the background.
pub async fn run(listener: TcpListener, options: Options) -> anyhow::Result<()> {
    let state = AppState::new();
    let init = tokio::spawn(initialise(state.clone(), options));
    tokio::spawn(watch(init));
    crate::serve_on(listener, state).await
}

async fn watch(init: JoinHandle<anyhow::Result<()>>) {
    match init.await {
        Ok(Ok(())) => info!("relay stopped"),
        Ok(Err(e)) => {
            let chain = format!("{e:#}");
            error!(error = %chain, "relay initialisation failed; serving health only");
        }
        Err(e) if e.is_panic() => error!(error = %e, "relay task panicked; serving health only"),
        Err(e) => error!(error = %e, "relay task was cancelled"),
    }
}

/// Load config, build services, install the relay, then run Socket Mode
/// when an app token is configured.
pub async fn initialise(state: AppState, options: Options) -> anyhow::Result<()> {
    tokio::time::sleep(options.startup_delay).await;

    let config = options.source.load()?;
    for warning in config.validate() {
        match warning.level {
            WarnLevel::Error => anyhow::bail!("invalid configuration: {}", warning.message),
            WarnLevel::Warning => warn!("{}", warning.message),
        }
    }

    let services = Arc::new(devbot_clients::build_services(&config)?);
    state
        .install(Relay {
            services: services.clone(),
            signing_secret: config.slack.signing_secret.clone(),
        })
        .await;
    info!(
        wiki = services.wiki.is_some(),
        tools = services.tools.is_some(),
        "relay ready"
    );

    if let Some(token) = &config.slack.app_token {
        let socket = SocketMode::new(
            devbot_clients::http_client()?,
            &config.slack.api_url,
            token.clone(),
            services,
        );
        socket.run().await;
    }
    Ok(())
}
