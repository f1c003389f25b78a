use devbot_core::{DevbotError, Result};
use reqwest::{Response, StatusCode};
use serde_json::Value;

/// Wrap a transport-level failure (connect, timeout, body read).
pub(crate) fn transport(service: &'static str, err: reqwest::Error) -> DevbotError {
    DevbotError::service(service, format!("request failed: {err}"))
}

/// Wrap a response body that did not have the expected shape.
pub(crate) fn decode(service: &'static str, what: &str, err: impl std::fmt::Display) -> DevbotError {
    DevbotError::service(service, format!("unexpected {what} response: {err}"))
}

/// Pass successful responses through. Anything else becomes
/// `DevbotError::NotFound` for 404 and `DevbotError::Service` otherwise,
/// carrying the most specific message the body offers.
pub(crate) async fn check(service: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    if status == StatusCode::NOT_FOUND {
        return Err(DevbotError::NotFound(format!("{url}: {message}")));
    }
    Err(DevbotError::service(service, format!("{status}: {message}")))
}

/// Pull a human-readable message out of an error body. Understands the
/// GitHub (`message`), Anthropic (`error.message`) and Confluence
/// (`message` / `errorMessages`) shapes; falls back to the raw body.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            value
                .get("errorMessages")
                .and_then(Value::as_array)
                .and_then(|msgs| msgs.first())
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
