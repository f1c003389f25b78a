use axum::extract::State;
use axum::{Form, Json};
use serde_json::Value;
use tracing::{info, warn};

use crate::dispatch::{self, SlashCommand};
use crate::error::AppError;
use crate::state::AppState;

/// POST /slack/commands: acknowledge a slash command and run it in the
/// background. Signature verification happens in middleware.
pub async fn slash_command(
    State(app): State<AppState>,
    Form(form): Form<SlashCommand>,
) -> Result<Json<Value>, AppError> {
    let relay = app
        .relay()
        .await
        .ok_or_else(|| AppError::unavailable("relay is still starting"))?;

    info!(command = %form.command, user = %form.user_name, "slash command received");
    let ack = dispatch::ack_text(&form.text);
    match form.into_command() {
        Ok(command) => {
            let handle = dispatch::spawn(relay.services, command);
            info!(task = %handle.id, "task dispatched");
            Ok(Json(dispatch::ephemeral(ack)))
        }
        Err(e) => {
            warn!(error = %e, "slash command rejected");
            Ok(Json(dispatch::ephemeral(format!("❌ {e}"))))
        }
    }
}
