//! Slack request signing (`v0` scheme).
//!
//! Slack signs `v0:{timestamp}:{raw body}` with HMAC-SHA256 keyed by the
//! app's signing secret and sends the hex digest as `X-Slack-Signature:
//! v0=...` next to `X-Slack-Request-Timestamp`. Requests older than five
//! minutes are rejected to limit replays.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

const VERSION: &str = "v0";
const REPLAY_WINDOW_SECS: i64 = 5 * 60;
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("malformed request timestamp")]
    BadTimestamp,
    #[error("request timestamp outside the replay window")]
    Stale,
    #[error("signature mismatch")]
    Mismatch,
}

fn mac(secret: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("infallible: hmac accepts keys of any length");
    mac.update(VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac
}

/// The `X-Slack-Signature` value for `body` sent at `timestamp`.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let digest = mac(secret, timestamp, body).finalize().into_bytes();
    format!("{VERSION}={}", hex::encode(digest))
}

/// Check `signature` against the request, with `now` as unix seconds.
pub fn verify(
    secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let sent: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::BadTimestamp)?;
    if (now - sent).abs() > REPLAY_WINDOW_SECS {
        return Err(SignatureError::Stale);
    }
    let expected = signature
        .strip_prefix("v0=")
        .and_then(|digest| hex::decode(digest).ok())
        .ok_or(SignatureError::Mismatch)?;
    mac(secret, timestamp, body)
        .verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// Axum middleware verifying Slack signatures on the wrapped routes.
///
/// Passes through when no signing secret is configured, or before the relay
/// is installed (the handler answers 503 then). The body is buffered for
/// hashing and handed on unchanged.
pub async fn verify_slack(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(secret) = state.relay().await.and_then(|relay| relay.signing_secret) else {
        return Ok(next.run(req).await);
    };

    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::unauthorized(format!("unreadable request body: {e}")))?;

    let header = |name: &'static str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or(SignatureError::MissingHeader(name))
    };
    let checked = header(TIMESTAMP_HEADER).and_then(|timestamp| {
        let signature = header(SIGNATURE_HEADER)?;
        verify(
            &secret,
            timestamp,
            &bytes,
            signature,
            chrono::Utc::now().timestamp(),
        )
    });
    if let Err(e) = checked {
        warn!(path = %parts.uri.path(), error = %e, "rejected slack request");
        return Err(AppError::unauthorized(e.to_string()));
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
