//! Axum router construction.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::session;
use crate::state::AppState;

/// Build the complete router:
///
/// - `GET /api/v1/status` -- current facility snapshot
/// - `GET /api/v1/health` -- liveness and client count
/// - `GET /ws` -- realtime `WebSocket` channel
///
/// CORS allows any origin so the dashboard can be served from anywhere.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/status", get(handlers::get_status))
        .route("/api/v1/health", get(handlers::get_health))
        .route("/ws", get(session::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
