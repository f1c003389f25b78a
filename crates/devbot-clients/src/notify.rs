use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use devbot_core::services::Notifier;
use devbot_core::Result;

use crate::error::{check, transport};

/// Posts `{"text": ...}` to a Slack `response_url`.
#[derive(Clone)]
pub struct ResponseUrlNotifier {
    client: Client,
}

impl ResponseUrlNotifier {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for ResponseUrlNotifier {
    async fn notify(&self, address: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(address)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| transport("callback", e))?;
        check("callback", response).await?;
        debug!(address = %address, chars = text.chars().count(), "callback delivered");
        Ok(())
    }
}
