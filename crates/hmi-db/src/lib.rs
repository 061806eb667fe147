//! `PostgreSQL` persistence for the HMI backend.
//!
//! Facility state is stored latest-wins: one row per tank and one row per
//! pump, updated in place. Alerts are derived in memory and never stored.
//!
//! # Modules
//!
//! - [`postgres`] -- connection pool and configuration
//! - [`facility_store`] -- queries against `hmi_tanks` and `hmi_pumps`
//! - [`gateway`] -- [`PersistenceGateway`] implementation over the pool
//! - [`error`] -- shared error types
//!
//! [`PersistenceGateway`]: hmi_core::PersistenceGateway

pub mod error;
pub mod facility_store;
pub mod gateway;
pub mod postgres;

// Re-export primary types for convenience.
pub use error::DbError;
pub use facility_store::{FacilityStore, PumpRow, TankRow};
pub use gateway::PostgresGateway;
pub use postgres::{PostgresConfig, PostgresPool};
