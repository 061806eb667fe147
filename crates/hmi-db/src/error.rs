//! Error types for the persistence layer.
//!
//! All errors are propagated via [`DbError`], which converts into the
//! core's [`GatewayError`] at the gateway boundary.

use hmi_core::GatewayError;
use hmi_types::UnknownPumpMode;

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored pump row carries a mode outside `AUTO`/`MANUAL`.
    #[error("invalid stored pump mode: {0}")]
    InvalidPumpMode(#[from] UnknownPumpMode),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for GatewayError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Postgres(
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_),
            )
            | DbError::Config(_) => Self::Unavailable(err.to_string()),
            DbError::Postgres(_) | DbError::Migration(_) | DbError::InvalidPumpMode(_) => {
                Self::Backend(err.to_string())
            }
        }
    }
}
