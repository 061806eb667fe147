//! Core state management for the HMI facility backend.
//!
//! This crate owns the consistency story of the backend:
//!
//! - [`store`] -- the single authoritative [`FacilityState`] behind a
//!   reader/writer lock, exposed only through snapshot-returning
//!   `mutate`/`read` primitives
//! - [`simulation`] -- the fixed-period engine that evolves tank levels,
//!   drives AUTO pumps and rebuilds alerts ([`alerts`])
//! - [`commands`] -- operator command processors with their persistence
//!   ordering rules
//! - [`persistence`] -- the gateway trait consumed by the core, plus the
//!   offline fallback and the startup bootstrap
//! - [`publish`] -- the hand-off trait to the broadcast fan-out
//! - [`config`] -- typed configuration loaded from `hmi-config.yaml`
//!
//! # Data flow
//!
//! ```text
//! SimulationEngine --+                         +--> PersistenceGateway
//!                    +--> Store::mutate --+----+
//! CommandProcessor --+     (lock held)    |    +--> StatePublisher --> hub
//!                                         +-- snapshot (lock released)
//! ```
//!
//! [`FacilityState`]: hmi_types::FacilityState

pub mod alerts;
pub mod commands;
pub mod config;
pub mod persistence;
pub mod publish;
pub mod simulation;
pub mod store;

// Re-export primary types for convenience.
pub use commands::{CommandOutcome, CommandProcessor};
pub use config::{ConfigError, HmiConfig, SimulationConfig};
pub use persistence::{GatewayError, OfflineGateway, PersistenceGateway, load_or_seed};
pub use publish::StatePublisher;
pub use simulation::SimulationEngine;
pub use store::{Snapshot, Store};
