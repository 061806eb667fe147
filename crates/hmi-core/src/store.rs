//! The single authoritative in-memory facility state.
//!
//! [`Store`] wraps the live [`FacilityState`] in a reader/writer lock and
//! only ever hands out owned snapshots. Lock guards never leave this
//! module, so no caller can hold the lock across persistence I/O or
//! serialization, and no reader can observe a half-applied mutation.
//!
//! Every mutation bumps a version counter under the write lock. Snapshots
//! carry that version, so consumers can tell which of two snapshots
//! committed later even when they are published out of order.

use hmi_types::FacilityState;
use tokio::sync::RwLock;

/// A facility state together with the commit that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Commit counter, strictly increasing across mutations.
    pub version: u64,
    /// The state as that mutation left it.
    pub state: FacilityState,
}

#[derive(Debug, Default)]
struct Versioned {
    version: u64,
    state: FacilityState,
}

/// Owner of the live facility aggregate.
///
/// Shared as `Arc<Store>` between the simulation engine, the command
/// processors and the status endpoint.
#[derive(Debug, Default)]
pub struct Store {
    inner: RwLock<Versioned>,
}

impl Store {
    /// Create a store holding `initial` as the live state, at version 0.
    pub fn new(initial: FacilityState) -> Self {
        Self {
            inner: RwLock::new(Versioned {
                version: 0,
                state: initial,
            }),
        }
    }

    /// Apply `f` to the live state under exclusive access.
    ///
    /// Returns whatever `f` returns together with a deep snapshot of the
    /// state as `f` left it, stamped with a fresh version. The lock is
    /// released before this returns.
    pub async fn mutate<F, R>(&self, f: F) -> (R, Snapshot)
    where
        F: FnOnce(&mut FacilityState) -> R,
    {
        let mut guard = self.inner.write().await;
        let result = f(&mut guard.state);
        guard.version = guard.version.saturating_add(1);
        let snapshot = Snapshot {
            version: guard.version,
            state: guard.state.clone(),
        };
        drop(guard);
        (result, snapshot)
    }

    /// Take a snapshot of the live state under shared access.
    pub async fn read(&self) -> FacilityState {
        self.inner.read().await.state.clone()
    }

    /// Version of the most recent mutation (0 before any).
    pub async fn version(&self) -> u64 {
        self.inner.read().await.version
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::indexing_slicing,
    clippy::cast_precision_loss
)]
mod tests {
    use std::sync::Arc;

    use hmi_types::{PumpMode, PumpStatus, TankStatus};

    use super::*;

    fn two_tanks() -> FacilityState {
        FacilityState {
            tanks: vec![TankStatus::new("A", 0.0), TankStatus::new("B", 0.0)],
            pumps: vec![PumpStatus::new("P", false, PumpMode::Manual)],
            active_alerts: Vec::new(),
        }
    }

    #[tokio::test]
    async fn mutate_returns_result_and_post_state_snapshot() {
        let store = Store::new(two_tanks());
        let (previous, snapshot) = store
            .mutate(|s| {
                let tank = s.tank_mut("A").unwrap();
                let prev = tank.level;
                tank.level = 12.5;
                prev
            })
            .await;

        assert_eq!(previous, 0.0);
        assert_eq!(snapshot.state.tank("A").unwrap().level, 12.5);
        assert_eq!(store.read().await, snapshot.state);
    }

    #[tokio::test]
    async fn versions_follow_commit_order() {
        let store = Store::new(two_tanks());
        assert_eq!(store.version().await, 0);

        let ((), first) = store.mutate(|s| s.pumps[0].on = true).await;
        let ((), second) = store.mutate(|s| s.pumps[0].on = false).await;

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(store.version().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mutations_get_distinct_versions() {
        let store = Arc::new(Store::new(two_tanks()));
        let mut handles = Vec::new();
        for _ in 0..100 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.mutate(|s| s.tanks[0].level += 1.0).await.1
            }));
        }

        let mut snapshots = Vec::new();
        for handle in handles {
            snapshots.push(handle.await.unwrap());
        }
        snapshots.sort_by_key(|s| s.version);

        let versions: Vec<u64> = snapshots.iter().map(|s| s.version).collect();
        assert_eq!(versions, (1..=100).collect::<Vec<u64>>());
        // A later version always carries every earlier increment.
        for snap in &snapshots {
            assert_eq!(snap.state.tanks[0].level, snap.version as f64);
        }
    }

    #[tokio::test]
    async fn snapshots_are_independent_of_later_mutations() {
        let store = Store::new(two_tanks());
        let before = store.read().await;
        let ((), _) = store.mutate(|s| s.pumps[0].on = true).await;

        assert!(!before.pumps[0].on);
        assert!(store.read().await.pumps[0].on);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mutations_are_all_applied() {
        let store = Arc::new(Store::new(two_tanks()));
        let mut handles = Vec::new();
        for _ in 0..200 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.mutate(|s| s.tanks[0].level += 1.0).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.read().await.tanks[0].level, 200.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_partial_mutation() {
        let store = Arc::new(Store::new(two_tanks()));

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 1..=500 {
                    let level = f64::from(i);
                    store
                        .mutate(|s| {
                            s.tanks[0].level = level;
                            s.tanks[1].level = level;
                        })
                        .await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            readers.push(tokio::spawn(async move {
                for _ in 0..500 {
                    let snap = store.read().await;
                    assert_eq!(snap.tanks[0].level, snap.tanks[1].level);
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
