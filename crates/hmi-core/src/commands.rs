//! Operator command processing.
//!
//! Both commands follow the same shape: validate and mutate under the
//! store lock, release it, persist, then publish the snapshot. They differ
//! only in persistence ordering:
//!
//! - `SET_PUMP_MODE` persists on a detached task and never delays the
//!   broadcast.
//! - `SET_PUMP_STATE` awaits the write before publishing, so what clients
//!   see for this command has been handed to the backend.
//!
//! Commands arrive over a channel with no request/response correlation, so
//! nothing here returns an error to the sender. Every path publishes,
//! including no-ops, matching what connected dashboards expect.

use std::sync::Arc;

use hmi_types::{Command, PumpMode};
use tracing::{info, warn};

use crate::persistence::PersistenceGateway;
use crate::publish::StatePublisher;
use crate::store::Store;

/// What a command did to the facility state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The pump changed.
    Applied,
    /// The pump was already in the requested state.
    Unchanged,
    /// `SET_PUMP_STATE` against a pump that is not in MANUAL mode.
    RejectedAutoMode,
    /// No pump has the requested identifier.
    UnknownPump,
}

impl CommandOutcome {
    /// Whether the command reached a pump it is allowed to drive, and so
    /// should be persisted.
    pub const fn reached_pump(self) -> bool {
        matches!(self, Self::Applied | Self::Unchanged)
    }
}

/// Applies operator commands to the shared store.
pub struct CommandProcessor {
    store: Arc<Store>,
    gateway: Arc<dyn PersistenceGateway>,
    publisher: Arc<dyn StatePublisher>,
}

impl CommandProcessor {
    /// Create a processor over `store`.
    pub fn new(
        store: Arc<Store>,
        gateway: Arc<dyn PersistenceGateway>,
        publisher: Arc<dyn StatePublisher>,
    ) -> Self {
        Self {
            store,
            gateway,
            publisher,
        }
    }

    /// Route a decoded command to its processor.
    pub async fn dispatch(&self, command: Command) -> CommandOutcome {
        match command {
            Command::SetPumpMode(p) => self.set_pump_mode(&p.id, p.mode).await,
            Command::SetPumpState(p) => self.set_pump_state(&p.id, p.on).await,
        }
    }

    /// Overwrite a pump's operating mode.
    pub async fn set_pump_mode(&self, id: &str, mode: PumpMode) -> CommandOutcome {
        let (outcome, snapshot) = self
            .store
            .mutate(|state| match state.pump_mut(id) {
                Some(pump) if pump.mode == mode => CommandOutcome::Unchanged,
                Some(pump) => {
                    pump.mode = mode;
                    CommandOutcome::Applied
                }
                None => CommandOutcome::UnknownPump,
            })
            .await;

        if outcome.reached_pump() {
            info!(pump_id = id, %mode, ?outcome, "pump mode set");
            let gateway = Arc::clone(&self.gateway);
            let id = id.to_owned();
            tokio::spawn(async move {
                if let Err(e) = gateway.record_pump_mode(&id, mode).await {
                    warn!(pump_id = id, error = %e, "failed to persist pump mode");
                }
            });
        } else {
            warn!(pump_id = id, "SET_PUMP_MODE for unknown pump ignored");
        }

        self.publisher.publish(&snapshot);
        outcome
    }

    /// Switch a pump on or off. Only MANUAL pumps accept this.
    pub async fn set_pump_state(&self, id: &str, on: bool) -> CommandOutcome {
        let (outcome, snapshot) = self
            .store
            .mutate(|state| match state.pump_mut(id) {
                None => CommandOutcome::UnknownPump,
                Some(pump) if pump.mode != PumpMode::Manual => CommandOutcome::RejectedAutoMode,
                Some(pump) if pump.on == on => CommandOutcome::Unchanged,
                Some(pump) => {
                    pump.on = on;
                    CommandOutcome::Applied
                }
            })
            .await;

        match outcome {
            CommandOutcome::Applied | CommandOutcome::Unchanged => {
                info!(pump_id = id, on, ?outcome, "pump state set");
                if let Err(e) = self.gateway.record_pump_state(id, on).await {
                    warn!(pump_id = id, error = %e, "failed to persist pump state");
                }
            }
            CommandOutcome::RejectedAutoMode => {
                warn!(pump_id = id, on, "SET_PUMP_STATE ignored: pump is in AUTO mode");
            }
            CommandOutcome::UnknownPump => {
                warn!(pump_id = id, "SET_PUMP_STATE for unknown pump ignored");
            }
        }

        self.publisher.publish(&snapshot);
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use hmi_types::{FacilityState, SetPumpStatePayload};

    use super::*;
    use crate::config::SimulationConfig;
    use crate::testing::{GatewayCall, Journal, RecordingGateway, RecordingPublisher};

    struct Fixture {
        store: Arc<Store>,
        publisher: Arc<RecordingPublisher>,
        calls: tokio::sync::mpsc::UnboundedReceiver<GatewayCall>,
        processor: CommandProcessor,
    }

    fn fixture_with(
        gateway: RecordingGateway,
        calls: tokio::sync::mpsc::UnboundedReceiver<GatewayCall>,
    ) -> Fixture {
        let store = Arc::new(Store::new(SimulationConfig::default().seed_state()));
        let publisher = Arc::new(RecordingPublisher::default());
        let processor =
            CommandProcessor::new(Arc::clone(&store), Arc::new(gateway), publisher.clone());
        Fixture {
            store,
            publisher,
            calls,
            processor,
        }
    }

    fn fixture() -> Fixture {
        let (gateway, calls) = RecordingGateway::new();
        fixture_with(gateway, calls)
    }

    async fn next_call(
        calls: &mut tokio::sync::mpsc::UnboundedReceiver<GatewayCall>,
    ) -> GatewayCall {
        tokio::time::timeout(Duration::from_secs(1), calls.recv())
            .await
            .unwrap()
            .unwrap()
    }

    fn pump(state: &FacilityState, id: &str) -> (bool, PumpMode) {
        let p = state.pump(id).unwrap();
        (p.on, p.mode)
    }

    #[tokio::test]
    async fn set_mode_applies_persists_and_publishes() {
        let mut f = fixture();

        let outcome = f.processor.set_pump_mode("PUMP_1", PumpMode::Manual).await;

        assert_eq!(outcome, CommandOutcome::Applied);
        assert_eq!(pump(&f.store.read().await, "PUMP_1").1, PumpMode::Manual);
        assert_eq!(
            next_call(&mut f.calls).await,
            GatewayCall::PumpMode("PUMP_1".to_owned(), PumpMode::Manual)
        );
        assert_eq!(f.publisher.snapshots(), vec![f.store.read().await]);
    }

    #[tokio::test]
    async fn set_mode_to_current_mode_is_unchanged() {
        let mut f = fixture();
        let outcome = f.processor.set_pump_mode("PUMP_2", PumpMode::Manual).await;
        assert_eq!(outcome, CommandOutcome::Unchanged);
        assert_eq!(
            next_call(&mut f.calls).await,
            GatewayCall::PumpMode("PUMP_2".to_owned(), PumpMode::Manual)
        );
    }

    #[tokio::test]
    async fn set_mode_for_unknown_pump_broadcasts_prior_snapshot() {
        let mut f = fixture();
        let before = f.store.read().await;

        let outcome = f.processor.set_pump_mode("PUMP_404", PumpMode::Manual).await;

        assert_eq!(outcome, CommandOutcome::UnknownPump);
        assert_eq!(f.store.read().await, before);
        assert_eq!(f.publisher.snapshots(), vec![before]);
        tokio::task::yield_now().await;
        assert!(f.calls.try_recv().is_err());
    }

    #[tokio::test]
    async fn set_state_on_manual_pump_applies() {
        let mut f = fixture();

        let outcome = f.processor.set_pump_state("PUMP_2", true).await;

        assert_eq!(outcome, CommandOutcome::Applied);
        assert!(pump(&f.store.read().await, "PUMP_2").0);
        assert_eq!(
            f.calls.try_recv().unwrap(),
            GatewayCall::PumpState("PUMP_2".to_owned(), true)
        );
    }

    #[tokio::test]
    async fn set_state_on_auto_pump_is_a_no_op() {
        let mut f = fixture();
        let before = f.store.read().await;

        let outcome = f.processor.set_pump_state("PUMP_1", true).await;

        assert_eq!(outcome, CommandOutcome::RejectedAutoMode);
        assert_eq!(f.store.read().await, before);
        assert_eq!(f.publisher.snapshots(), vec![before]);
        assert!(f.calls.try_recv().is_err());
    }

    #[tokio::test]
    async fn set_state_for_unknown_pump_is_a_no_op() {
        let mut f = fixture();
        let before = f.store.read().await;
        let outcome = f.processor.set_pump_state("PUMP_404", false).await;
        assert_eq!(outcome, CommandOutcome::UnknownPump);
        assert_eq!(f.store.read().await, before);
        assert!(f.calls.try_recv().is_err());
    }

    #[tokio::test]
    async fn state_changes_only_while_manual() {
        let f = fixture();
        let script: [(Option<PumpMode>, bool); 8] = [
            (None, true),
            (Some(PumpMode::Manual), true),
            (None, false),
            (Some(PumpMode::Auto), true),
            (None, true),
            (None, false),
            (Some(PumpMode::Manual), true),
            (None, true),
        ];

        for (mode_change, on) in script {
            if let Some(mode) = mode_change {
                f.processor.set_pump_mode("PUMP_1", mode).await;
            }
            let (on_before, mode_now) = pump(&f.store.read().await, "PUMP_1");
            f.processor
                .dispatch(Command::SetPumpState(SetPumpStatePayload {
                    id: "PUMP_1".to_owned(),
                    on,
                }))
                .await;
            let (on_after, _) = pump(&f.store.read().await, "PUMP_1");

            if mode_now == PumpMode::Manual {
                assert_eq!(on_after, on);
            } else {
                assert_eq!(on_after, on_before);
            }
        }
    }

    #[tokio::test]
    async fn pump_state_is_persisted_before_broadcast() {
        let journal = Journal::default();
        let (gateway, calls) = RecordingGateway::new();
        let gateway = gateway.with_journal(journal.clone());
        let store = Arc::new(Store::new(SimulationConfig::default().seed_state()));
        let publisher = Arc::new(RecordingPublisher::default().with_journal(journal.clone()));
        let processor = CommandProcessor::new(store, Arc::new(gateway), publisher);
        drop(calls);

        processor.set_pump_state("PUMP_2", true).await;

        assert_eq!(journal.entries(), vec!["persist", "publish"]);
    }

    #[tokio::test]
    async fn persistence_failure_keeps_in_memory_change() {
        let (gateway, calls) = RecordingGateway::failing();
        let f = fixture_with(gateway, calls);

        let outcome = f.processor.set_pump_state("PUMP_2", true).await;

        assert_eq!(outcome, CommandOutcome::Applied);
        assert!(pump(&f.store.read().await, "PUMP_2").0);
        assert_eq!(f.publisher.snapshots().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_state_command_publishes_older_version_than_interleaved_tick() {
        let config = SimulationConfig::default();
        let store = Arc::new(Store::new(config.seed_state()));
        let publisher = Arc::new(RecordingPublisher::default());
        let (gateway, _calls) = RecordingGateway::new();
        let gateway = gateway.with_delay(Duration::from_millis(200));
        let processor = Arc::new(CommandProcessor::new(
            Arc::clone(&store),
            Arc::new(gateway),
            publisher.clone(),
        ));
        let engine = crate::SimulationEngine::new(config, Arc::clone(&store), publisher.clone());

        let command = {
            let processor = Arc::clone(&processor);
            tokio::spawn(async move { processor.set_pump_state("PUMP_2", true).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.tick().await;
        assert_eq!(command.await.unwrap(), CommandOutcome::Applied);

        // The tick committed second but published first; versions expose it.
        assert_eq!(publisher.versions(), vec![2, 1]);
        let latest = publisher.snapshots()[0].clone();
        assert_eq!(latest, store.read().await);
        assert!(latest.pump("PUMP_2").unwrap().on);
    }
}
