//! Periodic facility simulation and alert derivation.
//!
//! Every tick, inside one store mutation, the engine:
//!
//! 1. Reseeds the aggregate if any configured tank or pump is missing
//! 2. Advances every tank level, wrapping to its baseline past the bound
//! 3. Switches AUTO pumps from their watched tank level
//! 4. Rebuilds the alert set from scratch
//!
//! and then publishes the resulting snapshot. The engine is the only
//! source of automatic state drift; without it the facility changes only
//! through operator commands.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmi_types::{FacilityState, PumpMode};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::alerts::derive_alerts;
use crate::config::SimulationConfig;
use crate::publish::StatePublisher;
use crate::store::{Snapshot, Store};

/// Advance `state` by one tick.
///
/// Returns `true` if the state had to be reseeded first.
pub fn step(config: &SimulationConfig, state: &mut FacilityState, now: DateTime<Utc>) -> bool {
    let reseeded = !config.is_complete(state);
    if reseeded {
        *state = config.seed_state();
    }

    for profile in &config.tanks {
        if let Some(tank) = state.tank_mut(&profile.id) {
            tank.level = profile.advance(tank.level);
        }
    }

    for rule in &config.automation {
        let Some(level) = state.tank(&rule.tank_id).map(|t| t.level) else {
            continue;
        };
        if let Some(pump) = state.pump_mut(&rule.pump_id)
            && pump.mode == PumpMode::Auto
        {
            pump.on = level > rule.on_above;
        }
    }

    state.active_alerts = derive_alerts(state, &config.alerts, now);
    reseeded
}

/// Drives [`step`] against the shared store on a fixed period.
pub struct SimulationEngine {
    config: SimulationConfig,
    store: Arc<Store>,
    publisher: Arc<dyn StatePublisher>,
}

impl SimulationEngine {
    /// Create an engine over `store` that publishes through `publisher`.
    pub fn new(
        config: SimulationConfig,
        store: Arc<Store>,
        publisher: Arc<dyn StatePublisher>,
    ) -> Self {
        Self {
            config,
            store,
            publisher,
        }
    }

    /// Run a single tick: mutate, release the lock, publish.
    ///
    /// Returns the published snapshot.
    pub async fn tick(&self) -> Snapshot {
        let (reseeded, snapshot) = self
            .store
            .mutate(|state| step(&self.config, state, Utc::now()))
            .await;

        if reseeded {
            warn!("facility state incomplete, reseeded to defaults");
        }
        debug!(
            version = snapshot.version,
            alerts = snapshot.state.active_alerts.len(),
            "simulation tick"
        );

        self.publisher.publish(&snapshot);
        snapshot
    }

    /// Tick forever at the configured period.
    ///
    /// The first tick happens one full period after the call. Ticks that
    /// fall behind are delayed rather than bunched up.
    pub async fn run(self) {
        let period = self.config.tick_interval();
        info!(period_ms = self.config.tick_interval_ms, "simulation engine started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// Spawn [`run`](Self::run) on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::RecordingPublisher;

    fn run_ticks(config: &SimulationConfig, state: &mut FacilityState, ticks: usize) {
        for _ in 0..ticks {
            step(config, state, Utc::now());
        }
    }

    fn tank_1(state: &FacilityState) -> f64 {
        state.tank("TANK_1").unwrap().level
    }

    fn pump_1_on(state: &FacilityState) -> bool {
        state.pump("PUMP_1").unwrap().on
    }

    #[test]
    fn empty_state_is_reseeded_then_advanced() {
        let config = SimulationConfig::default();
        let mut state = FacilityState::default();

        assert!(step(&config, &mut state, Utc::now()));
        assert_eq!(tank_1(&state), 0.5);
        assert_eq!(state.tank("TANK_2").unwrap().level, 31.0);
        assert_eq!(state.pumps.len(), 2);

        assert!(!step(&config, &mut state, Utc::now()));
    }

    #[test]
    fn auto_pump_switches_on_strictly_above_ninety() {
        let config = SimulationConfig::default();
        let mut state = config.seed_state();

        run_ticks(&config, &mut state, 180);
        assert_eq!(tank_1(&state), 90.0);
        assert!(!pump_1_on(&state));

        run_ticks(&config, &mut state, 1);
        assert_eq!(tank_1(&state), 90.5);
        assert!(pump_1_on(&state));
    }

    #[test]
    fn high_alert_from_ninety_five() {
        let config = SimulationConfig::default();
        let mut state = config.seed_state();

        run_ticks(&config, &mut state, 189);
        assert!(!state.has_alert("T-100-HIGH"));

        run_ticks(&config, &mut state, 1);
        assert_eq!(tank_1(&state), 95.0);
        assert!(state.has_alert("T-100-HIGH"));
    }

    #[test]
    fn tank_one_wraps_to_zero_after_reaching_one_hundred() {
        let config = SimulationConfig::default();
        let mut state = config.seed_state();

        run_ticks(&config, &mut state, 200);
        assert_eq!(tank_1(&state), 100.0);
        assert!(pump_1_on(&state));

        run_ticks(&config, &mut state, 1);
        assert_eq!(tank_1(&state), 0.0);
        assert!(!pump_1_on(&state));
        assert!(!state.has_alert("T-100-HIGH"));
    }

    #[test]
    fn tank_two_cycles_between_thirty_and_sixty() {
        let config = SimulationConfig::default();
        let mut state = config.seed_state();

        run_ticks(&config, &mut state, 30);
        assert_eq!(state.tank("TANK_2").unwrap().level, 60.0);
        run_ticks(&config, &mut state, 1);
        assert_eq!(state.tank("TANK_2").unwrap().level, 30.0);
    }

    /// Under the default dynamics TANK_1 only rises and wraps to 0, so the
    /// low alert is reachable only in the band just after each wraparound
    /// (and right after startup from level 0).
    #[test]
    fn low_alert_only_fires_in_post_wrap_band() {
        let config = SimulationConfig::default();
        let mut state = config.seed_state();

        let mut low_ticks = Vec::new();
        for tick in 1..=402_u32 {
            step(&config, &mut state, Utc::now());
            if state.has_alert("T-100-LOW") {
                low_ticks.push(tick);
            }
        }

        let expected: Vec<u32> = (1..=20).chain(201..=221).chain(402..=402).collect();
        assert_eq!(low_ticks, expected);
    }

    /// TANK_2 wraps at 60, so its 95% alert can never fire under the
    /// default dynamics.
    #[test]
    fn upper_tank_high_alert_is_unreachable_by_default() {
        let config = SimulationConfig::default();
        let mut state = config.seed_state();
        for _ in 0..1_000 {
            step(&config, &mut state, Utc::now());
            assert!(!state.has_alert("T-200-HIGH"));
        }
    }

    #[test]
    fn manual_pump_is_never_driven_by_simulation() {
        let mut config = SimulationConfig::default();
        config.automation[0].pump_id = "PUMP_2".to_owned();
        let mut state = config.seed_state();
        state.pump_mut("PUMP_2").unwrap().on = true;

        run_ticks(&config, &mut state, 50);
        assert!(state.pump("PUMP_2").unwrap().on);
    }

    #[test]
    fn alert_set_is_replaced_each_tick() {
        let config = SimulationConfig::default();
        let mut state = config.seed_state();
        step(&config, &mut state, Utc::now());
        assert!(state.has_alert("T-100-LOW"));

        state.tank_mut("TANK_1").unwrap().level = 50.0;
        step(&config, &mut state, Utc::now());
        assert!(state.active_alerts.is_empty());
    }

    #[tokio::test]
    async fn tick_publishes_the_committed_snapshot() {
        let config = SimulationConfig::default();
        let store = Arc::new(Store::new(config.seed_state()));
        let publisher = Arc::new(RecordingPublisher::default());
        let engine = SimulationEngine::new(config, Arc::clone(&store), publisher.clone());

        let snapshot = engine.tick().await;

        assert_eq!(publisher.snapshots(), vec![snapshot.state.clone()]);
        assert_eq!(publisher.versions(), vec![snapshot.version]);
        assert_eq!(store.read().await, snapshot.state);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_on_the_configured_period() {
        let config = SimulationConfig::default();
        let store = Arc::new(Store::new(config.seed_state()));
        let publisher = Arc::new(RecordingPublisher::default());
        let handle =
            SimulationEngine::new(config, Arc::clone(&store), publisher.clone()).spawn();

        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert!(publisher.snapshots().is_empty());

        tokio::time::sleep(Duration::from_millis(4_200)).await;
        assert_eq!(publisher.snapshots().len(), 3);
        assert_eq!(tank_1(&store.read().await), 1.5);

        handle.abort();
    }
}
