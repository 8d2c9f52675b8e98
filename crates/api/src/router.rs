//! Application router construction.
//!
//! Extracted into a function so that both `main.rs` and integration tests
//! can build the same router with the same middleware stack.

use axum::routing::get;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::routes;
use crate::state::AppState;
use crate::ws;

/// Build the application router: the WebSocket endpoint at `/` and the
/// health check, wrapped in the middleware stack.
pub fn build_app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws::ws_handler))
        .merge(routes::health::router())
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
