//! Temperature anomaly detection
//!
//! This module provides:
//! - Threshold alerts (warning, critical, recovery) with cooldown
//! - Spike detection over a trailing window of stored readings

mod alerter;
mod spike_detector;

pub use alerter::{AlertEngine, CooldownCache, CooldownCheck};
pub use spike_detector::{find_spike_candidates, SpikeDetector, SweepReport};
