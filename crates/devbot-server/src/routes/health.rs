use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub const SERVICE_NAME: &str = "devbot";

/// GET /health: liveness only; no dependency checks.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

/// GET /: process status plus whether the relay has been installed.
pub async fn status(State(app): State<AppState>) -> Json<Value> {
    let relay = if app.is_ready().await { "ready" } else { "starting" };
    Json(json!({ "status": "running", "service": SERVICE_NAME, "relay": relay }))
}
