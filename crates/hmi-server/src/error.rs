//! Error types for the HTTP layer.
//!
//! [`ApiError`] converts into an Axum response with a JSON body of the
//! form `{"error": "...", "status": 503}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::hub::HubStopped;

/// Errors that can occur while serving an API request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A backing service needed to answer is not running.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl From<HubStopped> for ApiError {
    fn from(err: HubStopped) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
