//! Subcommand implementations

pub mod alerts;
pub mod maintenance;
pub mod spikes;
pub mod stats;

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use thermal_engine::{
    settings::SettingsProvider, AlertEngine, SpikeDetector, StatisticsEngine, Store,
};

use crate::output::OutputFormat;

/// One temperature for one drive
#[derive(Debug, Args)]
pub struct ReadingArgs {
    /// Host the drive is attached to
    pub hostname: String,
    /// Drive serial number
    pub serial: String,
    /// Temperature in °C
    #[arg(allow_negative_numbers = true)]
    pub temperature: i64,
}

/// Open database plus the settings and output format for one invocation
pub struct Session {
    pub store: Store,
    pub settings: Arc<dyn SettingsProvider>,
    pub format: OutputFormat,
}

impl Session {
    pub fn open(db_path: &Path, settings: Arc<dyn SettingsProvider>, format: OutputFormat) -> Result<Self> {
        let store = Store::open(db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        Ok(Self {
            store,
            settings,
            format,
        })
    }

    pub fn alert_engine(&self) -> AlertEngine {
        AlertEngine::new(self.store.clone(), Arc::clone(&self.settings))
    }

    pub fn detector(&self) -> SpikeDetector {
        SpikeDetector::new(self.store.clone())
    }

    pub fn statistics(&self) -> StatisticsEngine {
        StatisticsEngine::new(
            self.store.clone(),
            Arc::clone(&self.settings),
            Arc::new(self.store.clone()),
        )
    }
}
