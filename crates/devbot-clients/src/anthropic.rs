use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use devbot_core::services::Completion;
use devbot_core::{DevbotError, Result};

use crate::error::{check, decode, transport};

const SERVICE: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API, one user turn per call.
#[derive(Clone)]
pub struct Anthropic {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl Anthropic {
    pub fn new(
        client: Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Serialize)]
struct CreateMessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[async_trait]
impl Completion for Anthropic {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        info!(model = %self.model, prompt_chars = prompt.chars().count(), "completion request");
        let body = CreateMessageRequest {
            model: &self.model,
            max_tokens,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };
        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(SERVICE, e))?;
        let parsed: CreateMessageResponse = check(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| decode(SERVICE, "messages", e))?;

        let text = parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .ok_or_else(|| DevbotError::service(SERVICE, "response contained no text"))?;
        debug!(chars = text.chars().count(), "completion received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn complete_returns_first_text_block() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-test")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(Matcher::Json(serde_json::json!({
                "model": "claude-3-5-sonnet-20240620",
                "max_tokens": 4096,
                "messages": [{"role": "user", "content": "hello"}],
            })))
            .with_body(r#"{"content":[{"type":"text","text":"new code"}],"stop_reason":"end_turn"}"#)
            .create_async()
            .await;

        let client = Anthropic::new(Client::new(), server.url(), "sk-test", "claude-3-5-sonnet-20240620");
        let text = client.complete("hello", 4096).await.unwrap();
        assert_eq!(text, "new code");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn api_error_message_is_surfaced() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .create_async()
            .await;

        let client = Anthropic::new(Client::new(), server.url(), "sk", "m");
        let err = client.complete("hello", 10).await.unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }

    #[tokio::test]
    async fn response_without_text_is_an_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/messages")
            .with_body(r#"{"content":[{"type":"tool_use","id":"t","name":"x","input":{}}]}"#)
            .create_async()
            .await;

        let client = Anthropic::new(Client::new(), server.url(), "sk", "m");
        let err = client.complete("hello", 10).await.unwrap_err();
        assert!(err.to_string().contains("no text"));
    }
}
