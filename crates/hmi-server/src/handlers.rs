//! REST endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/v1/status` | Current facility snapshot |
//! | `GET` | `/api/v1/health` | Liveness, connected client count, state version |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use hmi_types::FacilityState;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `GET /api/v1/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the hub answers.
    pub status: &'static str,
    /// Number of registered realtime clients.
    pub clients: usize,
    /// Version of the most recent committed state change.
    pub version: u64,
}

/// Return the current facility snapshot.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<FacilityState> {
    Json(state.store.read().await)
}

/// Report liveness and the hub's registry size.
pub async fn get_health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let clients = state.hub.client_count().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        clients,
        version: state.store.version().await,
    }))
}
