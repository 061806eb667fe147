//! [`PersistenceGateway`] backed by `PostgreSQL`.

use async_trait::async_trait;
use hmi_core::{GatewayError, PersistenceGateway};
use hmi_types::{FacilityState, PumpMode};
use tracing::{debug, info};

use crate::error::DbError;
use crate::facility_store::FacilityStore;
use crate::postgres::{PostgresConfig, PostgresPool};

/// Persists facility state to the `hmi_tanks` and `hmi_pumps` tables.
#[derive(Clone)]
pub struct PostgresGateway {
    pool: PostgresPool,
}

impl PostgresGateway {
    /// Wrap an already connected pool.
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    /// Connect, run migrations, and insert any missing rows from
    /// `defaults`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection, a migration, or seeding
    /// fails.
    pub async fn connect(
        config: &PostgresConfig,
        defaults: &FacilityState,
    ) -> Result<Self, DbError> {
        let pool = PostgresPool::connect(config).await?;
        pool.run_migrations().await?;
        let inserted = FacilityStore::new(pool.pool()).seed_missing(defaults).await?;
        if inserted > 0 {
            info!(inserted, "Seeded default facility rows");
        }
        Ok(Self::new(pool))
    }

    /// The underlying pool.
    pub const fn pool(&self) -> &PostgresPool {
        &self.pool
    }

    fn store(&self) -> FacilityStore<'_> {
        FacilityStore::new(self.pool.pool())
    }
}

#[async_trait]
impl PersistenceGateway for PostgresGateway {
    async fn load_initial_state(&self) -> Result<FacilityState, GatewayError> {
        Ok(self.store().load_state().await?)
    }

    async fn record_pump_mode(&self, id: &str, mode: PumpMode) -> Result<(), GatewayError> {
        let updated = self.store().update_pump_mode(id, mode).await?;
        if !updated {
            debug!(pump_id = id, "no stored row for pump, mode not recorded");
        }
        Ok(())
    }

    async fn record_pump_state(&self, id: &str, on: bool) -> Result<(), GatewayError> {
        let updated = self.store().update_pump_state(id, on).await?;
        if !updated {
            debug!(pump_id = id, "no stored row for pump, state not recorded");
        }
        Ok(())
    }
}
