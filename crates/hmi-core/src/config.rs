//! Configuration loading and typed config structures for the HMI backend.
//!
//! The canonical configuration lives in `hmi-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure and a
//! loader that reads, overrides from the environment, and validates it.
//! Every field has a default matching the facility the backend was first
//! deployed against, so an empty (or absent) file yields a working setup.

use std::path::Path;
use std::time::Duration;

use hmi_types::{AlertSeverity, FacilityState, PumpMode, PumpStatus, TankStatus};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but is internally inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level backend configuration.
///
/// Mirrors the structure of `hmi-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HmiConfig {
    /// Listener and realtime session settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Persistence backend settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Facility layout and simulation dynamics.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HmiConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DATABASE_URL` overrides `database.url`
    /// - `HMI_HOST` overrides `server.host`
    /// - `HMI_PORT` overrides `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if the simulation rules are inconsistent.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if the simulation rules are inconsistent.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        config.server.validate()?;
        config.simulation.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Override connection settings with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DATABASE_URL") {
            self.database.url = Some(val);
        }
        if let Ok(val) = std::env::var("HMI_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("HMI_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!(value = val, error = %e, "ignoring invalid HMI_PORT"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Listener and realtime session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Address to bind (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Capacity of each client's outbound delivery queue. A client whose
    /// queue is full when a broadcast arrives is evicted.
    #[serde(default = "default_client_queue_capacity")]
    pub client_queue_capacity: usize,

    /// A session with no inbound frame (including pongs) for this long is closed.
    #[serde(default = "default_read_deadline_ms")]
    pub read_deadline_ms: u64,

    /// Deadline for each individual outbound write.
    #[serde(default = "default_write_deadline_ms")]
    pub write_deadline_ms: u64,

    /// Period between liveness pings.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
}

impl ServerConfig {
    /// Read deadline as a [`Duration`].
    pub const fn read_deadline(&self) -> Duration {
        Duration::from_millis(self.read_deadline_ms)
    }

    /// Write deadline as a [`Duration`].
    pub const fn write_deadline(&self) -> Duration {
        Duration::from_millis(self.write_deadline_ms)
    }

    /// Ping period as a [`Duration`].
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Check that session timing can keep a healthy client connected.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a period is zero or pings are
    /// not sent more often than the read deadline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_deadline_ms == 0 || self.write_deadline_ms == 0 || self.ping_interval_ms == 0
        {
            return Err(ConfigError::Invalid(
                "server deadlines and ping interval must be positive".to_owned(),
            ));
        }
        if self.ping_interval_ms >= self.read_deadline_ms {
            return Err(ConfigError::Invalid(format!(
                "server.ping_interval_ms ({}) must be shorter than read_deadline_ms ({})",
                self.ping_interval_ms, self.read_deadline_ms
            )));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_queue_capacity: default_client_queue_capacity(),
            read_deadline_ms: default_read_deadline_ms(),
            write_deadline_ms: default_write_deadline_ms(),
            ping_interval_ms: default_ping_interval_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Persistence backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL. When absent the backend runs offline.
    #[serde(default)]
    pub url: Option<String>,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Facility layout and simulation dynamics.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Real-time milliseconds between simulation ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Tanks, in display order, with their per-tick dynamics.
    #[serde(default = "default_tanks")]
    pub tanks: Vec<TankProfile>,

    /// Pumps, in display order, with their seed state.
    #[serde(default = "default_pumps")]
    pub pumps: Vec<PumpProfile>,

    /// Level-driven switching rules for pumps in AUTO mode.
    #[serde(default = "default_automation")]
    pub automation: Vec<AutomationRule>,

    /// Level thresholds that raise alerts.
    #[serde(default = "default_alerts")]
    pub alerts: Vec<AlertRule>,
}

impl SimulationConfig {
    /// Tick period as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// The default facility state: every tank at its initial level, every
    /// pump in its seed mode, no alerts.
    pub fn seed_state(&self) -> FacilityState {
        FacilityState {
            tanks: self
                .tanks
                .iter()
                .map(|t| TankStatus::new(t.id.clone(), t.initial_level))
                .collect(),
            pumps: self
                .pumps
                .iter()
                .map(|p| PumpStatus::new(p.id.clone(), p.on, p.mode))
                .collect(),
            active_alerts: Vec::new(),
        }
    }

    /// Whether `state` contains every configured tank and pump.
    pub fn is_complete(&self, state: &FacilityState) -> bool {
        self.tanks.iter().all(|t| state.tank(&t.id).is_some())
            && self.pumps.iter().all(|p| state.pump(&p.id).is_some())
    }

    /// Reorder `state`'s tanks and pumps to match the configured display
    /// order. Entries that are not configured keep their relative order
    /// after the configured ones.
    pub fn arrange(&self, state: &mut FacilityState) {
        state.tanks.sort_by_key(|tank| {
            self.tanks
                .iter()
                .position(|t| t.id == tank.id)
                .unwrap_or(usize::MAX)
        });
        state.pumps.sort_by_key(|pump| {
            self.pumps
                .iter()
                .position(|p| p.id == pump.id)
                .unwrap_or(usize::MAX)
        });
    }

    /// Check that every rule refers to a configured entity and every tank
    /// profile has a sane wraparound band.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "simulation.tick_interval_ms must be positive".to_owned(),
            ));
        }
        for tank in &self.tanks {
            if tank.baseline > tank.upper_bound {
                return Err(ConfigError::Invalid(format!(
                    "tank {}: baseline {} exceeds upper bound {}",
                    tank.id, tank.baseline, tank.upper_bound
                )));
            }
        }
        let has_tank = |id: &str| self.tanks.iter().any(|t| t.id == id);
        let has_pump = |id: &str| self.pumps.iter().any(|p| p.id == id);
        for rule in &self.automation {
            if !has_pump(&rule.pump_id) || !has_tank(&rule.tank_id) {
                return Err(ConfigError::Invalid(format!(
                    "automation rule {} -> {} refers to an unknown entity",
                    rule.tank_id, rule.pump_id
                )));
            }
        }
        for rule in &self.alerts {
            if !has_tank(&rule.tank_id) {
                return Err(ConfigError::Invalid(format!(
                    "alert {} refers to unknown tank {}",
                    rule.id, rule.tank_id
                )));
            }
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            tanks: default_tanks(),
            pumps: default_pumps(),
            automation: default_automation(),
            alerts: default_alerts(),
        }
    }
}

/// A simulated tank and its per-tick dynamics.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TankProfile {
    /// Tank identifier.
    pub id: String,
    /// Level the tank is seeded with.
    #[serde(default)]
    pub initial_level: f64,
    /// Level added every tick.
    pub increment: f64,
    /// Once the level exceeds this bound it resets to `baseline`.
    pub upper_bound: f64,
    /// Level the tank resets to after exceeding `upper_bound`.
    pub baseline: f64,
}

impl TankProfile {
    /// The level one tick after `level`.
    pub fn advance(&self, level: f64) -> f64 {
        let next = level + self.increment;
        if next > self.upper_bound {
            self.baseline
        } else {
            next
        }
    }
}

/// A pump and the state it is seeded with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PumpProfile {
    /// Pump identifier.
    pub id: String,
    /// Seed operating mode.
    #[serde(default = "default_pump_mode")]
    pub mode: PumpMode,
    /// Seed actuation state.
    #[serde(default)]
    pub on: bool,
}

/// Drives an AUTO pump from a tank level: on while the level is above
/// `on_above`, off otherwise.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AutomationRule {
    /// Pump that is switched.
    pub pump_id: String,
    /// Tank whose level is watched.
    pub tank_id: String,
    /// Strict threshold for switching on.
    pub on_above: f64,
}

/// Comparison applied by an [`AlertRule`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    /// Active while the level is at or below the value.
    AtOrBelow(f64),
    /// Active while the level is at or above the value.
    AtOrAbove(f64),
}

impl Threshold {
    /// Whether `level` satisfies this threshold.
    pub fn is_met(self, level: f64) -> bool {
        match self {
            Self::AtOrBelow(limit) => level <= limit,
            Self::AtOrAbove(limit) => level >= limit,
        }
    }
}

/// Raises an alert while a tank level satisfies a threshold.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlertRule {
    /// Identifier of the raised alert.
    pub id: String,
    /// Tank whose level is watched.
    pub tank_id: String,
    /// Condition on the level.
    #[serde(with = "serde_yml::with::singleton_map")]
    pub threshold: Threshold,
    /// Message carried by the alert.
    pub message: String,
    /// Severity carried by the alert.
    pub severity: AlertSeverity,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_client_queue_capacity() -> usize {
    256
}

const fn default_read_deadline_ms() -> u64 {
    60_000
}

const fn default_write_deadline_ms() -> u64 {
    10_000
}

const fn default_ping_interval_ms() -> u64 {
    45_000
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

const fn default_tick_interval_ms() -> u64 {
    2_000
}

const fn default_pump_mode() -> PumpMode {
    PumpMode::Auto
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_tanks() -> Vec<TankProfile> {
    vec![
        TankProfile {
            id: "TANK_1".to_owned(),
            initial_level: 0.0,
            increment: 0.5,
            upper_bound: 100.0,
            baseline: 0.0,
        },
        TankProfile {
            id: "TANK_2".to_owned(),
            initial_level: 30.0,
            increment: 1.0,
            upper_bound: 60.0,
            baseline: 30.0,
        },
    ]
}

fn default_pumps() -> Vec<PumpProfile> {
    vec![
        PumpProfile {
            id: "PUMP_1".to_owned(),
            mode: PumpMode::Auto,
            on: false,
        },
        PumpProfile {
            id: "PUMP_2".to_owned(),
            mode: PumpMode::Manual,
            on: false,
        },
    ]
}

fn default_automation() -> Vec<AutomationRule> {
    vec![AutomationRule {
        pump_id: "PUMP_1".to_owned(),
        tank_id: "TANK_1".to_owned(),
        on_above: 90.0,
    }]
}

fn default_alerts() -> Vec<AlertRule> {
    vec![
        AlertRule {
            id: "T-100-LOW".to_owned(),
            tank_id: "TANK_1".to_owned(),
            threshold: Threshold::AtOrBelow(10.0),
            message: "CRITICAL low level - Cistern T-100".to_owned(),
            severity: AlertSeverity::Critical,
        },
        AlertRule {
            id: "T-100-HIGH".to_owned(),
            tank_id: "TANK_1".to_owned(),
            threshold: Threshold::AtOrAbove(95.0),
            message: "High level alert - Cistern T-100".to_owned(),
            severity: AlertSeverity::Warning,
        },
        AlertRule {
            id: "T-200-HIGH".to_owned(),
            tank_id: "TANK_2".to_owned(),
            threshold: Threshold::AtOrAbove(95.0),
            message: "High level alert - Upper Tank T-200".to_owned(),
            severity: AlertSeverity::Warning,
        },
    ]
}
