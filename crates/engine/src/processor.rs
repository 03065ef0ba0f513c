//! Ingest queue and background tasks
//!
//! The processor owns three tasks driven by one cancellation token:
//! - the queue consumer, which stores and evaluates readings one at a time
//! - the periodic spike detection sweep
//! - the periodic retention cleanup

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::anomaly::{AlertEngine, SpikeDetector, SweepReport};
use crate::health::{components, HealthRegistry};
use crate::models::Alert;
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::retention::{self, CleanupReport};
use crate::store;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("processor already started")]
    AlreadyStarted,

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Queue size and task schedule
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub queue_capacity: usize,
    pub detection_interval: Duration,
    pub cleanup_interval: Duration,
    pub cleanup_initial_delay: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            detection_interval: Duration::from_secs(15 * 60),
            cleanup_interval: Duration::from_secs(24 * 60 * 60),
            cleanup_initial_delay: Duration::from_secs(30),
        }
    }
}

/// How a submitted reading was handled
#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    /// Accepted by the queue; the consumer will evaluate it
    Queued,
    /// Queue unavailable; evaluated on the caller with this result
    Inline(Option<Alert>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorStatus {
    pub running: bool,
    pub queue_depth: usize,
    pub queue_capacity: usize,
}

#[derive(Debug)]
struct QueuedReading {
    hostname: String,
    serial: String,
    temperature: i64,
    at: DateTime<Utc>,
}

pub struct Processor {
    engine: Arc<AlertEngine>,
    detector: SpikeDetector,
    health: HealthRegistry,
    config: ProcessorConfig,
    sender: mpsc::Sender<QueuedReading>,
    receiver: Mutex<Option<mpsc::Receiver<QueuedReading>>>,
    cancel: CancellationToken,
    running: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl Processor {
    pub fn new(
        engine: Arc<AlertEngine>,
        detector: SpikeDetector,
        health: HealthRegistry,
        config: ProcessorConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            engine,
            detector,
            health,
            config,
            sender,
            receiver: Mutex::new(Some(receiver)),
            cancel: CancellationToken::new(),
            running: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::default(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn engine(&self) -> &Arc<AlertEngine> {
        &self.engine
    }

    /// Spawn the consumer and the periodic tasks
    ///
    /// Must be called from within a Tokio runtime. A processor can only be
    /// started once.
    pub fn start(self: &Arc<Self>) -> Result<(), ProcessorError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or(ProcessorError::AlreadyStarted)?;
        self.running.store(true, Ordering::SeqCst);

        let handles = vec![
            tokio::spawn(Arc::clone(self).consume(receiver)),
            tokio::spawn(Arc::clone(self).run_detection()),
            tokio::spawn(Arc::clone(self).run_cleanup()),
        ];
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(handles);

        info!(
            queue_capacity = self.config.queue_capacity,
            detection_interval_secs = self.config.detection_interval.as_secs(),
            cleanup_interval_secs = self.config.cleanup_interval.as_secs(),
            "Processor started"
        );
        Ok(())
    }

    /// Submit a reading for storage and evaluation
    ///
    /// The queue is the preferred path. When it is full, or closed because
    /// the processor is stopping, the reading is stored and evaluated right
    /// here on the caller's thread instead. Readings are never dropped for
    /// lack of queue space.
    pub fn enqueue(&self, hostname: &str, serial: &str, temperature: i64) -> EnqueueOutcome {
        let reading = QueuedReading {
            hostname: hostname.to_string(),
            serial: serial.to_string(),
            temperature,
            at: Utc::now(),
        };

        match self.sender.try_send(reading) {
            Ok(()) => {
                self.metrics.set_queue_depth(self.queue_depth() as i64);
                EnqueueOutcome::Queued
            }
            Err(TrySendError::Full(reading)) | Err(TrySendError::Closed(reading)) => {
                debug!(
                    hostname = %reading.hostname,
                    serial = %reading.serial,
                    "Queue unavailable, evaluating reading inline"
                );
                self.metrics.inc_inline_evaluations();
                EnqueueOutcome::Inline(self.engine.process_reading_at(
                    &reading.hostname,
                    &reading.serial,
                    reading.temperature,
                    reading.at,
                ))
            }
        }
    }

    /// Run one detection sweep and raise an alert per new spike
    pub fn sweep(&self) -> store::Result<SweepReport> {
        let thresholds = self.engine.thresholds();
        let report = self
            .detector
            .detect_all_drives_spikes(thresholds.spike_window_minutes, thresholds.spike_threshold)?;

        for spike in &report.spikes {
            if let Err(e) = self.engine.create_spike_alert(spike) {
                warn!(spike_id = spike.id, error = %e, "Failed to raise spike alert");
            }
        }
        Ok(report)
    }

    /// Delete data past its retention period
    pub fn cleanup(&self) -> store::Result<CleanupReport> {
        let report = retention::run_cleanup(
            self.engine.store(),
            &self.engine.thresholds(),
            Utc::now(),
        )?;

        self.metrics
            .add_cleanup_deleted("temperature_readings", report.readings_deleted as u64);
        self.metrics
            .add_cleanup_deleted("temperature_spikes", report.spikes_deleted as u64);
        self.metrics
            .add_cleanup_deleted("temperature_alerts", report.alerts_deleted as u64);
        self.logger.log_cleanup_completed(
            report.readings_deleted,
            report.spikes_deleted,
            report.alerts_deleted,
        );
        Ok(report)
    }

    /// Signal every task to finish; safe to call repeatedly
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Stopping processor");
        }
        self.cancel.cancel();
    }

    /// Stop and wait for every task to exit
    pub async fn shutdown(&self) -> Result<(), ProcessorError> {
        self.stop();
        let handles: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            handle.await?;
        }
        Ok(())
    }

    pub fn status(&self) -> ProcessorStatus {
        ProcessorStatus {
            running: self.running.load(Ordering::SeqCst),
            queue_depth: self.queue_depth(),
            queue_capacity: self.sender.max_capacity(),
        }
    }

    fn queue_depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    async fn consume(self: Arc<Self>, mut receiver: mpsc::Receiver<QueuedReading>) {
        info!("Starting reading consumer");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = receiver.recv() => match next {
                    Some(reading) => self.evaluate_queued(reading).await,
                    None => break,
                },
            }
        }

        // Late submitters fall back to inline evaluation from here on
        receiver.close();
        let mut drained = 0usize;
        while let Ok(reading) = receiver.try_recv() {
            self.evaluate_queued(reading).await;
            drained += 1;
        }
        info!(drained = drained, "Reading consumer stopped");
    }

    async fn evaluate_queued(&self, reading: QueuedReading) {
        self.metrics.set_queue_depth(self.queue_depth() as i64);
        let engine = Arc::clone(&self.engine);
        let result = tokio::task::spawn_blocking(move || {
            engine.process_reading_at(
                &reading.hostname,
                &reading.serial,
                reading.temperature,
                reading.at,
            )
        })
        .await;

        if let Err(e) = result {
            warn!(error = %e, "Reading evaluation task failed");
            self.health
                .set_degraded(components::PROCESSOR, format!("evaluation task failed: {e}"))
                .await;
        }
    }

    async fn run_detection(self: Arc<Self>) {
        let period = self.config.detection_interval;
        info!(interval_secs = period.as_secs(), "Starting spike detection loop");

        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let this = Arc::clone(&self);
                    let outcome = tokio::task::spawn_blocking(move || this.sweep()).await;
                    match outcome {
                        Ok(Ok(report)) if report.failures == 0 => {
                            self.health.set_healthy(components::DETECTOR).await;
                        }
                        Ok(Ok(report)) => {
                            self.health
                                .set_degraded(
                                    components::DETECTOR,
                                    format!("{} drives failed detection", report.failures),
                                )
                                .await;
                        }
                        Ok(Err(e)) => {
                            warn!(error = %e, "Spike detection sweep failed");
                            self.health.set_degraded(components::DETECTOR, e.to_string()).await;
                        }
                        Err(e) => {
                            warn!(error = %e, "Spike detection task failed");
                            self.health.set_degraded(components::DETECTOR, e.to_string()).await;
                        }
                    }
                }
                _ = self.cancel.cancelled() => {
                    info!("Shutting down spike detection loop");
                    break;
                }
            }
        }
    }

    async fn run_cleanup(self: Arc<Self>) {
        let period = self.config.cleanup_interval;
        info!(
            interval_secs = period.as_secs(),
            initial_delay_secs = self.config.cleanup_initial_delay.as_secs(),
            "Starting retention cleanup loop"
        );

        let mut ticker = interval_at(Instant::now() + self.config.cleanup_initial_delay, period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let this = Arc::clone(&self);
                    match tokio::task::spawn_blocking(move || this.cleanup()).await {
                        Ok(Ok(_)) => self.health.set_healthy(components::CLEANUP).await,
                        Ok(Err(e)) => {
                            warn!(error = %e, "Retention cleanup failed");
                            self.health.set_degraded(components::CLEANUP, e.to_string()).await;
                        }
                        Err(e) => {
                            warn!(error = %e, "Retention cleanup task failed");
                            self.health.set_degraded(components::CLEANUP, e.to_string()).await;
                        }
                    }
                }
                _ = self.cancel.cancelled() => {
                    info!("Shutting down retention cleanup loop");
                    break;
                }
            }
        }
    }
}
