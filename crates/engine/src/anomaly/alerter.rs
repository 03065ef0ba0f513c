//! Threshold alerting for temperature readings
//!
//! Handles:
//! - Warning and critical alerts with a per-drive, per-type cooldown
//! - A single recovery alert when a drive returns below the warning threshold
//! - Spike alerts raised by the detection sweep
//! - Alert lifecycle (list, acknowledge, delete, summary)

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::{Alert, AlertType, DriveStatus, NewAlert, Spike, Thresholds};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::settings::SettingsProvider;
use crate::store::{self, AlertFilter, AlertSummary, Store};

/// Key for cooldown tracking
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CooldownKey {
    hostname: String,
    serial: String,
    alert_type: AlertType,
}

impl CooldownKey {
    fn new(hostname: &str, serial: &str, alert_type: AlertType) -> Self {
        Self {
            hostname: hostname.to_string(),
            serial: serial.to_string(),
            alert_type,
        }
    }
}

/// Result of asking the cooldown cache for permission to alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownCheck {
    /// An alert of this type was raised too recently
    Suppressed,
    /// Permission granted; carries the entry it replaced for rollback
    Granted(Option<DateTime<Utc>>),
}

/// Last alert time per (drive, alert type)
#[derive(Debug, Default)]
pub struct CooldownCache {
    entries: Mutex<HashMap<CooldownKey, DateTime<Utc>>>,
}

impl CooldownCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CooldownKey, DateTime<Utc>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check and, when allowed, mark the entry as alerted at `now`
    ///
    /// Both steps happen under one lock hold, so two evaluations racing for
    /// the same drive cannot both pass.
    pub fn check_and_mark(
        &self,
        hostname: &str,
        serial: &str,
        alert_type: AlertType,
        now: DateTime<Utc>,
        window: Duration,
    ) -> CooldownCheck {
        let key = CooldownKey::new(hostname, serial, alert_type);
        let mut entries = self.lock();
        if let Some(last) = entries.get(&key) {
            if now - *last < window {
                return CooldownCheck::Suppressed;
            }
        }
        CooldownCheck::Granted(entries.insert(key, now))
    }

    /// Undo a granted mark, restoring the entry it replaced
    pub fn rollback(
        &self,
        hostname: &str,
        serial: &str,
        alert_type: AlertType,
        previous: Option<DateTime<Utc>>,
    ) {
        let key = CooldownKey::new(hostname, serial, alert_type);
        let mut entries = self.lock();
        match previous {
            Some(at) => {
                entries.insert(key, at);
            }
            None => {
                entries.remove(&key);
            }
        }
    }

    /// Forget every entry for one drive
    pub fn clear_drive(&self, hostname: &str, serial: &str) {
        self.lock()
            .retain(|key, _| !(key.hostname == hostname && key.serial == serial));
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Evaluates readings against thresholds and persists alerts
pub struct AlertEngine {
    store: Store,
    settings: Arc<dyn SettingsProvider>,
    cooldowns: CooldownCache,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl std::fmt::Debug for AlertEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertEngine")
            .field("store", &self.store)
            .field("cooldowns", &self.cooldowns.len())
            .finish()
    }
}

impl AlertEngine {
    pub fn new(store: Store, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            store,
            settings,
            cooldowns: CooldownCache::new(),
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::default(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Thresholds currently in force
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::load(self.settings.as_ref())
    }

    /// Persist a reading, then evaluate it
    ///
    /// A reading that cannot be stored is logged, counted and dropped.
    /// Evaluation errors are logged; the caller only learns whether an
    /// alert was raised.
    pub fn process_reading(&self, hostname: &str, serial: &str, temperature: i64) -> Option<Alert> {
        self.process_reading_at(hostname, serial, temperature, Utc::now())
    }

    pub fn process_reading_at(
        &self,
        hostname: &str,
        serial: &str,
        temperature: i64,
        at: DateTime<Utc>,
    ) -> Option<Alert> {
        let started = Instant::now();

        if let Err(e) = self.store.insert_reading(hostname, serial, temperature, at) {
            warn!(
                hostname = %hostname,
                serial = %serial,
                temperature = temperature,
                error = %e,
                "Failed to store temperature reading, dropping it"
            );
            self.metrics.inc_readings_dropped();
            return None;
        }
        self.metrics.inc_readings_ingested();

        let alert = match self.evaluate_at(hostname, serial, temperature, at) {
            Ok(alert) => alert,
            Err(e) => {
                warn!(
                    hostname = %hostname,
                    serial = %serial,
                    error = %e,
                    "Failed to evaluate temperature reading"
                );
                None
            }
        };

        self.metrics
            .observe_evaluation_latency(started.elapsed().as_secs_f64());
        alert
    }

    /// Evaluate a temperature without storing it
    pub fn check_temperature_and_alert(
        &self,
        hostname: &str,
        serial: &str,
        temperature: i64,
    ) -> store::Result<Option<Alert>> {
        self.evaluate_at(hostname, serial, temperature, Utc::now())
    }

    /// Manual test path: same rules as a real reading, nothing is stored
    /// except the alert itself
    pub fn test_alert(
        &self,
        hostname: &str,
        serial: &str,
        temperature: i64,
    ) -> store::Result<Option<Alert>> {
        debug!(
            hostname = %hostname,
            serial = %serial,
            temperature = temperature,
            "Evaluating test temperature"
        );
        self.check_temperature_and_alert(hostname, serial, temperature)
    }

    /// Evaluate a temperature observed at `now`
    pub fn evaluate_at(
        &self,
        hostname: &str,
        serial: &str,
        temperature: i64,
        now: DateTime<Utc>,
    ) -> store::Result<Option<Alert>> {
        let thresholds = self.thresholds();
        if !thresholds.alerting_enabled {
            return Ok(None);
        }

        let status = DriveStatus::classify(temperature, &thresholds);
        let Some(alert_type) = status.alert_type() else {
            return self.check_recovery(hostname, serial, temperature, &thresholds, now);
        };

        let window = Duration::try_minutes(thresholds.cooldown_minutes)
            .unwrap_or_else(|| Duration::minutes(Thresholds::default().cooldown_minutes));
        let previous = match self
            .cooldowns
            .check_and_mark(hostname, serial, alert_type, now, window)
        {
            CooldownCheck::Granted(previous) => previous,
            CooldownCheck::Suppressed => {
                debug!(
                    hostname = %hostname,
                    serial = %serial,
                    alert_type = %alert_type,
                    "Alert suppressed by cooldown"
                );
                self.metrics.inc_alerts_suppressed(alert_type);
                return Ok(None);
            }
        };

        let (threshold, message) = match alert_type {
            AlertType::Critical => (
                thresholds.critical,
                format!(
                    "CRITICAL: Drive {serial} on {hostname} reached {temperature}°C \
                     (critical threshold {}°C)",
                    thresholds.critical
                ),
            ),
            _ => (
                thresholds.warning,
                format!(
                    "WARNING: Drive {serial} on {hostname} reached {temperature}°C \
                     (warning threshold {}°C)",
                    thresholds.warning
                ),
            ),
        };

        let new_alert = NewAlert {
            hostname: hostname.to_string(),
            serial: serial.to_string(),
            alert_type,
            temperature,
            threshold,
            message,
            created_at: now,
        };

        match self.store.insert_alert(&new_alert) {
            Ok(alert) => {
                self.raised(&alert);
                Ok(Some(alert))
            }
            Err(e) => {
                self.cooldowns.rollback(hostname, serial, alert_type, previous);
                Err(e)
            }
        }
    }

    fn check_recovery(
        &self,
        hostname: &str,
        serial: &str,
        temperature: i64,
        thresholds: &Thresholds,
        now: DateTime<Utc>,
    ) -> store::Result<Option<Alert>> {
        if !thresholds.recovery_enabled {
            return Ok(None);
        }

        if self.store.active_alert_since_recovery(hostname, serial)?.is_none() {
            return Ok(None);
        }

        let alert = self.store.insert_alert(&NewAlert {
            hostname: hostname.to_string(),
            serial: serial.to_string(),
            alert_type: AlertType::Recovery,
            temperature,
            threshold: thresholds.warning,
            message: format!(
                "RECOVERED: Drive {serial} on {hostname} is back to {temperature}°C \
                 (below warning threshold {}°C)",
                thresholds.warning
            ),
            created_at: now,
        })?;

        self.cooldowns.clear_drive(hostname, serial);
        self.raised(&alert);
        Ok(Some(alert))
    }

    /// Persist an alert for a detected spike; no cooldown applies
    pub fn create_spike_alert(&self, spike: &Spike) -> store::Result<Option<Alert>> {
        let thresholds = self.thresholds();
        if !thresholds.alerting_enabled {
            return Ok(None);
        }

        let minutes = (spike.end_time - spike.start_time).num_minutes();
        let alert = self.store.insert_alert(&NewAlert {
            hostname: spike.hostname.clone(),
            serial: spike.serial.clone(),
            alert_type: AlertType::Spike,
            temperature: spike.end_temp,
            threshold: thresholds.spike_threshold,
            message: format!(
                "SPIKE: Drive {} on {} {} from {}°C to {}°C in {} min ({:.2}°C/min)",
                spike.serial,
                spike.hostname,
                spike.direction,
                spike.start_temp,
                spike.end_temp,
                minutes,
                spike.rate_per_minute
            ),
            created_at: Utc::now(),
        })?;

        self.raised(&alert);
        Ok(Some(alert))
    }

    fn raised(&self, alert: &Alert) {
        self.metrics.inc_alerts_raised(alert.alert_type);
        self.logger.log_alert_raised(alert);
    }

    pub fn reset_cooldowns(&self) {
        self.cooldowns.reset();
    }

    pub fn clear_drive_cooldowns(&self, hostname: &str, serial: &str) {
        self.cooldowns.clear_drive(hostname, serial);
    }

    pub fn get_alerts(&self, filter: &AlertFilter) -> store::Result<Vec<Alert>> {
        self.store.get_alerts(filter)
    }

    pub fn acknowledge_alert(&self, id: i64, acknowledged_by: &str) -> store::Result<Alert> {
        self.store.acknowledge_alert(id, acknowledged_by, Utc::now())
    }

    pub fn delete_alert(&self, id: i64) -> store::Result<()> {
        self.store.delete_alert(id)
    }

    pub fn get_alert_summary(&self) -> store::Result<AlertSummary> {
        self.store.alert_summary(Utc::now())
    }
}
