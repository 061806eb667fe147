//! Alert derivation from tank readings.
//!
//! The active alert set is a pure function of the current tank levels and
//! the configured [`AlertRule`]s. It is rebuilt from scratch on every
//! simulation tick and replaces the previous set wholesale.

use chrono::{DateTime, Utc};
use hmi_types::{Alert, FacilityState};

use crate::config::AlertRule;

/// Compute the alert set for `state`, stamped with `now`.
///
/// Alerts appear in rule order. A rule whose tank is missing from the
/// state raises nothing.
pub fn derive_alerts(state: &FacilityState, rules: &[AlertRule], now: DateTime<Utc>) -> Vec<Alert> {
    rules
        .iter()
        .filter(|rule| {
            state
                .tank(&rule.tank_id)
                .is_some_and(|tank| rule.threshold.is_met(tank.level))
        })
        .map(|rule| Alert {
            id: rule.id.clone(),
            message: rule.message.clone(),
            severity: rule.severity,
            active_at: now,
        })
        .collect()
}
