pub mod dispatch;
pub mod error;
pub mod routes;
pub mod signature;
pub mod socket;
pub mod state;
pub mod supervisor;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the axum Router with all routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::health::status))
        .route("/health", get(routes::health::health))
        .route(
            "/slack/commands",
            post(routes::commands::slash_command).layer(middleware::from_fn_with_state(
                state.clone(),
                signature::verify_slack,
            )),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on a pre-bound listener.
///
/// Accepting a bound `TcpListener` lets the caller read the actual port
/// first (useful when `port = 0` and the OS picks a free port).
pub async fn serve_on(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    let port = listener.local_addr()?.port();
    tracing::info!("devbot listening on http://0.0.0.0:{port}");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
