use std::sync::Arc;
use tokio::sync::RwLock;

use devbot_core::Services;

/// Everything the command endpoint needs once configuration has loaded.
#[derive(Clone)]
pub struct Relay {
    pub services: Arc<Services>,
    /// `None` disables request signature verification.
    pub signing_secret: Option<String>,
}

/// Shared application state passed to all route handlers.
///
/// The relay slot starts empty and is filled by the supervisor after the
/// startup delay; until then the command endpoint answers 503.
#[derive(Clone, Default)]
pub struct AppState {
    relay: Arc<RwLock<Option<Relay>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State with the relay already installed.
    pub fn ready(relay: Relay) -> Self {
        Self {
            relay: Arc::new(RwLock::new(Some(relay))),
        }
    }

    pub async fn install(&self, relay: Relay) {
        *self.relay.write().await = Some(relay);
    }

    pub async fn relay(&self) -> Option<Relay> {
        self.relay.read().await.clone()
    }

    pub async fn is_ready(&self) -> bool {
        self.relay.read().await.is_some()
    }
}
