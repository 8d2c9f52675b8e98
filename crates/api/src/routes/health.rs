use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Response body for the health check endpoint.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Number of scripts loaded at startup.
    pub scripts: usize,
    /// Number of scripts currently running.
    pub active: usize,
    /// Number of connected WebSocket peers.
    pub connections: usize,
}

/// GET /health
///
/// Always returns 200 OK; the engine has no external dependency that could
/// make it degraded.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        scripts: state.registry.len(),
        active: state.active.active_count(),
        connections: state.ws_manager.connection_count().await,
    })
}

/// Build the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
