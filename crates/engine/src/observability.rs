//! Observability infrastructure for the temperature engine
//!
//! Provides:
//! - Prometheus metrics (ingest, alerting, spike sweeps, retention cleanup)
//! - Structured JSON logging with tracing

use crate::models::{Alert, AlertType, Spike};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for a single reading evaluation (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    readings_ingested: IntCounter,
    readings_dropped: IntCounter,
    inline_evaluations: IntCounter,
    alerts_raised: IntCounterVec,
    alerts_suppressed: IntCounterVec,
    spikes_detected: IntCounter,
    sweep_failures: IntCounter,
    cleanup_rows_deleted: IntCounterVec,
    queue_depth: IntGauge,
    evaluation_latency_seconds: Histogram,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            readings_ingested: register_int_counter!(
                "thermwatch_readings_ingested_total",
                "Temperature readings persisted"
            )
            .expect("Failed to register readings_ingested"),

            readings_dropped: register_int_counter!(
                "thermwatch_readings_dropped_total",
                "Temperature readings dropped because they could not be persisted"
            )
            .expect("Failed to register readings_dropped"),

            inline_evaluations: register_int_counter!(
                "thermwatch_inline_evaluations_total",
                "Readings evaluated on the caller because the queue was full"
            )
            .expect("Failed to register inline_evaluations"),

            alerts_raised: register_int_counter_vec!(
                "thermwatch_alerts_raised_total",
                "Alerts persisted, by alert type",
                &["alert_type"]
            )
            .expect("Failed to register alerts_raised"),

            alerts_suppressed: register_int_counter_vec!(
                "thermwatch_alerts_suppressed_total",
                "Alert candidates suppressed by the cooldown, by alert type",
                &["alert_type"]
            )
            .expect("Failed to register alerts_suppressed"),

            spikes_detected: register_int_counter!(
                "thermwatch_spikes_detected_total",
                "New temperature spikes persisted"
            )
            .expect("Failed to register spikes_detected"),

            sweep_failures: register_int_counter!(
                "thermwatch_sweep_failures_total",
                "Per-drive failures during spike detection sweeps"
            )
            .expect("Failed to register sweep_failures"),

            cleanup_rows_deleted: register_int_counter_vec!(
                "thermwatch_cleanup_rows_deleted_total",
                "Rows removed by retention cleanup, by table",
                &["table"]
            )
            .expect("Failed to register cleanup_rows_deleted"),

            queue_depth: register_int_gauge!(
                "thermwatch_queue_depth",
                "Readings waiting in the processor queue"
            )
            .expect("Failed to register queue_depth"),

            evaluation_latency_seconds: register_histogram!(
                "thermwatch_evaluation_latency_seconds",
                "Time spent storing and evaluating one reading",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register evaluation_latency_seconds"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EngineMetrics")
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn inc_readings_ingested(&self) {
        self.inner().readings_ingested.inc();
    }

    pub fn inc_readings_dropped(&self) {
        self.inner().readings_dropped.inc();
    }

    pub fn inc_inline_evaluations(&self) {
        self.inner().inline_evaluations.inc();
    }

    pub fn inc_alerts_raised(&self, alert_type: AlertType) {
        self.inner()
            .alerts_raised
            .with_label_values(&[alert_type.as_str()])
            .inc();
    }

    pub fn inc_alerts_suppressed(&self, alert_type: AlertType) {
        self.inner()
            .alerts_suppressed
            .with_label_values(&[alert_type.as_str()])
            .inc();
    }

    pub fn add_spikes_detected(&self, count: u64) {
        self.inner().spikes_detected.inc_by(count);
    }

    pub fn inc_sweep_failures(&self) {
        self.inner().sweep_failures.inc();
    }

    /// Record rows removed from one table by a cleanup run
    pub fn add_cleanup_deleted(&self, table: &str, rows: u64) {
        self.inner()
            .cleanup_rows_deleted
            .with_label_values(&[table])
            .inc_by(rows);
    }

    pub fn set_queue_depth(&self, depth: i64) {
        self.inner().queue_depth.set(depth);
    }

    pub fn observe_evaluation_latency(&self, duration_secs: f64) {
        self.inner().evaluation_latency_seconds.observe(duration_secs);
    }
}

/// Structured logger for engine events
///
/// Provides consistent JSON-formatted logging for alerts, spikes and
/// housekeeping runs, tagged with the monitoring instance name.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new("thermwatch")
    }
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Log a persisted alert
    pub fn log_alert_raised(&self, alert: &Alert) {
        match alert.alert_type {
            AlertType::Critical => {
                warn!(
                    event = "alert_raised",
                    instance = %self.instance,
                    alert_id = alert.id,
                    hostname = %alert.hostname,
                    serial = %alert.serial,
                    alert_type = %alert.alert_type,
                    temperature = alert.temperature,
                    threshold = alert.threshold,
                    "Critical temperature alert raised"
                );
            }
            _ => {
                info!(
                    event = "alert_raised",
                    instance = %self.instance,
                    alert_id = alert.id,
                    hostname = %alert.hostname,
                    serial = %alert.serial,
                    alert_type = %alert.alert_type,
                    temperature = alert.temperature,
                    threshold = alert.threshold,
                    "Temperature alert raised"
                );
            }
        }
    }

    /// Log a newly persisted spike
    pub fn log_spike_detected(&self, spike: &Spike) {
        info!(
            event = "spike_detected",
            instance = %self.instance,
            spike_id = spike.id,
            hostname = %spike.hostname,
            serial = %spike.serial,
            direction = %spike.direction,
            start_temp = spike.start_temp,
            end_temp = spike.end_temp,
            magnitude = spike.magnitude,
            rate_per_minute = spike.rate_per_minute,
            "Temperature spike detected"
        );
    }

    /// Log the outcome of a fleet-wide spike sweep
    pub fn log_sweep_completed(&self, drives_scanned: usize, new_spikes: usize, failures: usize) {
        if failures > 0 {
            warn!(
                event = "sweep_completed",
                instance = %self.instance,
                drives_scanned = drives_scanned,
                new_spikes = new_spikes,
                failures = failures,
                "Spike sweep completed with failures"
            );
        } else {
            info!(
                event = "sweep_completed",
                instance = %self.instance,
                drives_scanned = drives_scanned,
                new_spikes = new_spikes,
                "Spike sweep completed"
            );
        }
    }

    /// Log a retention cleanup run
    pub fn log_cleanup_completed(&self, readings: usize, spikes: usize, alerts: usize) {
        info!(
            event = "cleanup_completed",
            instance = %self.instance,
            readings_deleted = readings,
            spikes_deleted = spikes,
            alerts_deleted = alerts,
            "Retention cleanup completed"
        );
    }

    /// Log engine startup
    pub fn log_startup(&self, version: &str, db_path: &str) {
        info!(
            event = "engine_started",
            instance = %self.instance,
            version = %version,
            db_path = %db_path,
            "Temperature engine started"
        );
    }

    /// Log engine shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Temperature engine shutting down"
        );
    }
}
