//! Error types for the backend binary.

/// Top-level error for the backend binary.
///
/// Only configuration problems and a failure to bind the listener are
/// fatal; every other fault degrades at runtime.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: hmi_core::ConfigError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: hmi_server::ServerError,
    },
}
