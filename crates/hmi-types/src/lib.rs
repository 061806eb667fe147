//! Shared type definitions for the HMI facility backend.
//!
//! This crate is the single source of truth for the facility aggregate and
//! the realtime wire protocol. Types defined here flow downstream to
//! `TypeScript` via `ts-rs` for the dashboard frontend.
//!
//! # Modules
//!
//! - [`facility`] -- Tanks, pumps, alerts and the [`FacilityState`] aggregate
//! - [`command`] -- Client-to-server command envelopes and decoding

pub mod command;
pub mod facility;

// Re-export all public types at crate root for convenience.
pub use command::{
    Command, DecodeError, Envelope, SET_PUMP_MODE, SET_PUMP_STATE, SetPumpModePayload,
    SetPumpStatePayload,
};
pub use facility::{
    Alert, AlertSeverity, FacilityState, PumpMode, PumpStatus, TankStatus, UnknownPumpMode,
};
