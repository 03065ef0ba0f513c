//! Age-based deletion of readings, spikes and alerts

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Thresholds;
use crate::store::{self, Store};

/// Rows removed by one cleanup run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub readings_deleted: usize,
    pub spikes_deleted: usize,
    pub alerts_deleted: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.readings_deleted + self.spikes_deleted + self.alerts_deleted
    }
}

/// Delete rows strictly older than their retention period as of `now`
///
/// Readings and spikes share the temperature retention; alerts have their own.
/// A table whose retention is not a positive, representable number of days
/// is left untouched.
pub fn run_cleanup(
    store: &Store,
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> store::Result<CleanupReport> {
    let mut report = CleanupReport::default();

    if let Some(cutoff) = cutoff(now, thresholds.temperature_retention_days) {
        report.readings_deleted = store.delete_readings_before(cutoff)?;
        report.spikes_deleted = store.delete_spikes_before(cutoff)?;
    }
    if let Some(cutoff) = cutoff(now, thresholds.alert_retention_days) {
        report.alerts_deleted = store.delete_alerts_before(cutoff)?;
    }
    Ok(report)
}

fn cutoff(now: DateTime<Utc>, retention_days: i64) -> Option<DateTime<Utc>> {
    if retention_days < 1 {
        return None;
    }
    TimeDelta::try_days(retention_days).and_then(|keep| now.checked_sub_signed(keep))
}
