//! Temperature monitoring engine for storage drives
//!
//! This crate provides the core functionality for:
//! - SQLite persistence of readings, spikes and alerts
//! - Temperature statistics, time series and fleet views
//! - Threshold alerting with cooldown and recovery
//! - Spike detection and retention cleanup on a schedule
//! - Health checks and observability

pub mod anomaly;
pub mod drive_info;
pub mod health;
pub mod models;
pub mod observability;
pub mod processor;
pub mod retention;
pub mod settings;
pub mod stats;
pub mod store;

pub use anomaly::{AlertEngine, SpikeDetector, SweepReport};
pub use drive_info::{DriveInfoLookup, NoDriveInfo, StaticDriveInfo};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use processor::{EnqueueOutcome, Processor, ProcessorConfig, ProcessorError, ProcessorStatus};
pub use retention::CleanupReport;
pub use settings::{SettingsProvider, StaticSettings};
pub use stats::{Period, StatisticsEngine};
pub use store::{AlertFilter, AlertSummary, SpikeFilter, Store, StoreError};
