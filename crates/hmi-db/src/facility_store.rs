//! Queries against the `hmi_tanks` and `hmi_pumps` tables.

use hmi_types::{FacilityState, PumpMode, PumpStatus, TankStatus};
use sqlx::PgPool;

use crate::error::DbError;

/// Operations on the facility tables.
pub struct FacilityStore<'a> {
    pool: &'a PgPool,
}

impl<'a> FacilityStore<'a> {
    /// Create a new facility store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Load every stored tank, ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn load_tanks(&self) -> Result<Vec<TankRow>, DbError> {
        let rows = sqlx::query_as::<_, TankRow>(
            r"SELECT id, level_percent FROM hmi_tanks ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Load every stored pump, ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn load_pumps(&self) -> Result<Vec<PumpRow>, DbError> {
        let rows = sqlx::query_as::<_, PumpRow>(
            r"SELECT id, is_on, pump_mode FROM hmi_pumps ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Load tanks and pumps into a [`FacilityState`] with no alerts.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if a query fails, or
    /// [`DbError::InvalidPumpMode`] if a pump row holds an unknown mode.
    pub async fn load_state(&self) -> Result<FacilityState, DbError> {
        let tanks = self.load_tanks().await?.into_iter().map(TankStatus::from).collect();
        let pumps = self
            .load_pumps()
            .await?
            .into_iter()
            .map(PumpStatus::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FacilityState {
            tanks,
            pumps,
            active_alerts: Vec::new(),
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a row for every tank and pump in `defaults` that is not stored
    /// yet. Existing rows are left untouched.
    ///
    /// Returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if an insert fails.
    pub async fn seed_missing(&self, defaults: &FacilityState) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted: u64 = 0;

        for tank in &defaults.tanks {
            let rows = sqlx::query(
                r"INSERT INTO hmi_tanks (id, level_percent)
                  VALUES ($1, $2)
                  ON CONFLICT (id) DO NOTHING",
            )
            .bind(&tank.id)
            .bind(tank.level)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            inserted = inserted.saturating_add(rows);
        }

        for pump in &defaults.pumps {
            let rows = sqlx::query(
                r"INSERT INTO hmi_pumps (id, is_on, pump_mode)
                  VALUES ($1, $2, $3)
                  ON CONFLICT (id) DO NOTHING",
            )
            .bind(&pump.id)
            .bind(pump.on)
            .bind(pump.mode.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
            inserted = inserted.saturating_add(rows);
        }

        tx.commit().await?;
        tracing::debug!(inserted, "Seeded missing facility rows");
        Ok(inserted)
    }

    /// Overwrite a pump's stored mode.
    ///
    /// Returns `false` if no row has that identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn update_pump_mode(&self, id: &str, mode: PumpMode) -> Result<bool, DbError> {
        let result = sqlx::query(r"UPDATE hmi_pumps SET pump_mode = $1 WHERE id = $2")
            .bind(mode.as_str())
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Overwrite a pump's stored on/off state.
    ///
    /// Returns `false` if no row has that identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn update_pump_state(&self, id: &str, on: bool) -> Result<bool, DbError> {
        let result = sqlx::query(r"UPDATE hmi_pumps SET is_on = $1 WHERE id = $2")
            .bind(on)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// A row from the `hmi_tanks` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TankRow {
    /// Tank identifier.
    pub id: String,
    /// Fill level in percent.
    pub level_percent: f64,
}

impl From<TankRow> for TankStatus {
    fn from(row: TankRow) -> Self {
        Self::new(row.id, row.level_percent)
    }
}

/// A row from the `hmi_pumps` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PumpRow {
    /// Pump identifier.
    pub id: String,
    /// Whether the pump is running.
    pub is_on: bool,
    /// `AUTO` or `MANUAL`.
    pub pump_mode: String,
}

impl TryFrom<PumpRow> for PumpStatus {
    type Error = DbError;

    fn try_from(row: PumpRow) -> Result<Self, Self::Error> {
        let mode = row.pump_mode.parse::<PumpMode>()?;
        Ok(Self::new(row.id, row.is_on, mode))
    }
}
