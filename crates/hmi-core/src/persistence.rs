//! Persistence gateway interface and startup state bootstrap.
//!
//! The core never talks to a database directly. It consumes a
//! [`PersistenceGateway`], whose failures are always non-fatal: a failed
//! initial load falls back to the configured seed state, and a failed
//! write is logged while the in-memory store stays authoritative.

use async_trait::async_trait;
use hmi_types::{FacilityState, PumpMode};
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;

/// Errors reported by a persistence gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No backend is configured or it cannot be reached.
    #[error("persistence unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected or failed an operation.
    #[error("persistence backend error: {0}")]
    Backend(String),
}

/// Durable storage for facility state.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Load the last recorded tanks and pumps. Alerts are never stored.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the backend cannot serve the load.
    async fn load_initial_state(&self) -> Result<FacilityState, GatewayError>;

    /// Record a pump's operating mode.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the write fails.
    async fn record_pump_mode(&self, id: &str, mode: PumpMode) -> Result<(), GatewayError>;

    /// Record a pump's actuation state.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the write fails.
    async fn record_pump_state(&self, id: &str, on: bool) -> Result<(), GatewayError>;
}

/// Gateway used when no database is configured or reachable.
///
/// Loads report [`GatewayError::Unavailable`] so startup falls back to the
/// seed state; writes are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGateway;

#[async_trait]
impl PersistenceGateway for OfflineGateway {
    async fn load_initial_state(&self) -> Result<FacilityState, GatewayError> {
        Err(GatewayError::Unavailable("no database configured".to_owned()))
    }

    async fn record_pump_mode(&self, id: &str, mode: PumpMode) -> Result<(), GatewayError> {
        debug!(pump_id = id, %mode, "offline: pump mode not persisted");
        Ok(())
    }

    async fn record_pump_state(&self, id: &str, on: bool) -> Result<(), GatewayError> {
        debug!(pump_id = id, on, "offline: pump state not persisted");
        Ok(())
    }
}

/// Load the initial facility state, falling back to the seed state.
///
/// The loaded state is used only if it contains every configured tank and
/// pump; otherwise the whole aggregate is reseeded. A loaded state is put
/// back into configured display order. Alerts always start empty and are
/// derived on the first simulation tick.
pub async fn load_or_seed(
    gateway: &dyn PersistenceGateway,
    config: &SimulationConfig,
) -> FacilityState {
    match gateway.load_initial_state().await {
        Ok(mut state) if config.is_complete(&state) => {
            state.active_alerts.clear();
            config.arrange(&mut state);
            info!(
                tanks = state.tanks.len(),
                pumps = state.pumps.len(),
                "initial state loaded from persistence"
            );
            state
        }
        Ok(state) => {
            warn!(
                tanks = state.tanks.len(),
                pumps = state.pumps.len(),
                "persisted state incomplete, seeding defaults"
            );
            config.seed_state()
        }
        Err(e) => {
            warn!(error = %e, "could not load persisted state, seeding defaults");
            config.seed_state()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hmi_types::{PumpStatus, TankStatus};

    use super::*;
    use crate::testing::RecordingGateway;

    #[tokio::test]
    async fn offline_gateway_falls_back_to_seed() {
        let config = SimulationConfig::default();
        let state = load_or_seed(&OfflineGateway, &config).await;
        assert_eq!(state, config.seed_state());
    }

    #[tokio::test]
    async fn offline_writes_succeed_silently() {
        assert!(OfflineGateway.record_pump_mode("PUMP_1", PumpMode::Manual).await.is_ok());
        assert!(OfflineGateway.record_pump_state("PUMP_2", true).await.is_ok());
    }

    #[tokio::test]
    async fn complete_persisted_state_is_used() {
        let config = SimulationConfig::default();
        let mut persisted = config.seed_state();
        if let Some(tank) = persisted.tank_mut("TANK_1") {
            tank.level = 73.5;
        }
        if let Some(pump) = persisted.pump_mut("PUMP_1") {
            pump.mode = PumpMode::Manual;
            pump.on = true;
        }
        let (gateway, _rx) = RecordingGateway::with_state(persisted.clone());

        let state = load_or_seed(&gateway, &config).await;
        assert_eq!(state, persisted);
    }

    #[tokio::test]
    async fn loaded_state_follows_configured_display_order() {
        let mut config = SimulationConfig::default();
        config.pumps.reverse();
        let mut persisted = SimulationConfig::default().seed_state();
        persisted.tanks.reverse();
        persisted.tanks.push(TankStatus::new("TANK_RETIRED", 10.0));
        let (gateway, _rx) = RecordingGateway::with_state(persisted);

        let state = load_or_seed(&gateway, &config).await;

        let tanks: Vec<&str> = state.tanks.iter().map(|t| t.id.as_str()).collect();
        let mut expected: Vec<&str> = config.tanks.iter().map(|t| t.id.as_str()).collect();
        expected.push("TANK_RETIRED");
        assert_eq!(tanks, expected);

        let pumps: Vec<&str> = state.pumps.iter().map(|p| p.id.as_str()).collect();
        let expected: Vec<&str> = config.pumps.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(pumps, expected);
    }

    #[tokio::test]
    async fn incomplete_persisted_state_is_reseeded() {
        let config = SimulationConfig::default();
        let partial = FacilityState {
            tanks: vec![TankStatus::new("TANK_1", 50.0)],
            pumps: vec![PumpStatus::new("PUMP_1", true, PumpMode::Manual)],
            active_alerts: Vec::new(),
        };
        let (gateway, _rx) = RecordingGateway::with_state(partial);

        let state = load_or_seed(&gateway, &config).await;
        assert_eq!(state, config.seed_state());
    }
}
