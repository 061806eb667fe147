//! Facility entities and the [`FacilityState`] aggregate.
//!
//! The aggregate is the unit of snapshotting, serialization and broadcast.
//! Field names on the wire follow the dashboard contract (`pumpMode`,
//! `activeAlerts`, `activeAt`), so every struct here carries explicit serde
//! renames rather than relying on a blanket case conversion.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Pump mode
// ---------------------------------------------------------------------------

/// Operating mode of a pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export, export_to = "bindings/")]
pub enum PumpMode {
    /// The simulation engine drives the pump's `on` flag.
    Auto,
    /// Operator commands drive the pump's `on` flag.
    Manual,
}

impl PumpMode {
    /// Wire and storage representation (`AUTO` / `MANUAL`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for PumpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known [`PumpMode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pump mode: {0}")]
pub struct UnknownPumpMode(pub String);

impl FromStr for PumpMode {
    type Err = UnknownPumpMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AUTO" => Ok(Self::Auto),
            "MANUAL" => Ok(Self::Manual),
            other => Err(UnknownPumpMode(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tanks and pumps
// ---------------------------------------------------------------------------

/// Fill level of a single storage tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TankStatus {
    /// Unique tank identifier.
    pub id: String,
    /// Fill level as a percentage (conventionally 0-100).
    pub level: f64,
}

impl TankStatus {
    /// Create a tank reading.
    pub fn new(id: impl Into<String>, level: f64) -> Self {
        Self {
            id: id.into(),
            level,
        }
    }
}

/// Actuation state and operating mode of a single pump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PumpStatus {
    /// Unique pump identifier.
    pub id: String,
    /// Whether the pump is running.
    pub on: bool,
    /// Who drives the `on` flag.
    #[serde(rename = "pumpMode")]
    pub mode: PumpMode,
}

impl PumpStatus {
    /// Create a pump status.
    pub fn new(id: impl Into<String>, on: bool, mode: PumpMode) -> Self {
        Self {
            id: id.into(),
            on,
            mode,
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Severity of a derived alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum AlertSeverity {
    /// Something is off but not critical.
    Warning,
    /// Immediate operator attention required.
    Critical,
}

/// An alert derived from the current tank readings.
///
/// Alerts carry no history: the whole set is recomputed every simulation
/// tick and `active_at` is the time of that computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Alert {
    /// Stable alert identifier (e.g. `T-100-HIGH`).
    pub id: String,
    /// Human-readable message.
    pub message: String,
    /// Severity, serialized as `level` for the dashboard.
    #[serde(rename = "level")]
    pub severity: AlertSeverity,
    /// When the alert set containing this alert was computed.
    #[serde(rename = "activeAt")]
    pub active_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// The complete facility state: tanks, pumps and active alerts.
///
/// There is no partial-state message; every status response and every
/// broadcast carries one whole `FacilityState`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FacilityState {
    /// Tanks in display order.
    pub tanks: Vec<TankStatus>,
    /// Pumps in display order.
    pub pumps: Vec<PumpStatus>,
    /// Currently active alerts.
    #[serde(rename = "activeAlerts")]
    pub active_alerts: Vec<Alert>,
}

impl FacilityState {
    /// Look up a tank by identifier.
    pub fn tank(&self, id: &str) -> Option<&TankStatus> {
        self.tanks.iter().find(|t| t.id == id)
    }

    /// Look up a tank by identifier for mutation.
    pub fn tank_mut(&mut self, id: &str) -> Option<&mut TankStatus> {
        self.tanks.iter_mut().find(|t| t.id == id)
    }

    /// Look up a pump by identifier.
    pub fn pump(&self, id: &str) -> Option<&PumpStatus> {
        self.pumps.iter().find(|p| p.id == id)
    }

    /// Look up a pump by identifier for mutation.
    pub fn pump_mut(&mut self, id: &str) -> Option<&mut PumpStatus> {
        self.pumps.iter_mut().find(|p| p.id == id)
    }

    /// Look up an active alert by identifier.
    pub fn alert(&self, id: &str) -> Option<&Alert> {
        self.active_alerts.iter().find(|a| a.id == id)
    }

    /// Whether an alert with the given identifier is active.
    pub fn has_alert(&self, id: &str) -> bool {
        self.alert(id).is_some()
    }
}
