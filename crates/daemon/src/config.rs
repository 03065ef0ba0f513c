//! Daemon configuration

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thermal_engine::settings::{
    range_error, StaticSettings, CATEGORY_ALERTS, CATEGORY_TEMPERATURE, KEY_ALERT_RETENTION,
    KEY_COOLDOWN, KEY_CRITICAL, KEY_ENABLED, KEY_RECOVERY, KEY_RETENTION, KEY_SPIKE_THRESHOLD,
    KEY_SPIKE_WINDOW, KEY_WARNING,
};
use thermal_engine::ProcessorConfig;

/// Environment variable prefix, e.g. `THERMWATCH_API_PORT`
pub const ENV_PREFIX: &str = "THERMWATCH";

/// Optional config file looked up in the working directory
pub const CONFIG_FILE: &str = "thermwatch";

/// Daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Name attached to structured log events
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Port for health, metrics, status and ingest
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_detection_interval")]
    pub detection_interval_secs: u64,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    #[serde(default = "default_cleanup_initial_delay")]
    pub cleanup_initial_delay_secs: u64,

    /// Initial threshold values; anything unset uses the engine default
    #[serde(default)]
    pub thresholds: ThresholdOverrides,
}

/// Threshold settings seeded into the engine at startup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdOverrides {
    pub warning: Option<i64>,
    pub critical: Option<i64>,
    pub spike_threshold: Option<i64>,
    pub spike_window_minutes: Option<i64>,
    pub cooldown_minutes: Option<i64>,
    pub recovery_alerts: Option<bool>,
    pub retention_days: Option<i64>,
    pub alert_retention_days: Option<i64>,
    pub alerting_enabled: Option<bool>,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "thermwatch".to_string())
}

fn default_db_path() -> PathBuf {
    PathBuf::from("thermwatch.db")
}

fn default_api_port() -> u16 {
    8080
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_detection_interval() -> u64 {
    15 * 60
}

fn default_cleanup_interval() -> u64 {
    24 * 60 * 60
}

fn default_cleanup_initial_delay() -> u64 {
    30
}

impl ThresholdOverrides {
    /// Write every set override into `settings`
    pub fn seed(&self, settings: &StaticSettings) {
        let ints = [
            (KEY_WARNING, self.warning),
            (KEY_CRITICAL, self.critical),
            (KEY_SPIKE_THRESHOLD, self.spike_threshold),
            (KEY_SPIKE_WINDOW, self.spike_window_minutes),
            (KEY_COOLDOWN, self.cooldown_minutes),
            (KEY_RETENTION, self.retention_days),
            (KEY_ALERT_RETENTION, self.alert_retention_days),
        ];
        for (key, value) in ints {
            if let Some(value) = value {
                settings.set_int(CATEGORY_TEMPERATURE, key, value);
            }
        }
        if let Some(recovery) = self.recovery_alerts {
            settings.set_bool(CATEGORY_TEMPERATURE, KEY_RECOVERY, recovery);
        }
        if let Some(enabled) = self.alerting_enabled {
            settings.set_bool(CATEGORY_ALERTS, KEY_ENABLED, enabled);
        }
    }
}

impl DaemonConfig {
    /// Load from `thermwatch.toml` (if present) overlaid by the environment
    pub fn load() -> Result<Self> {
        Self::load_from(config::File::with_name(CONFIG_FILE).required(false))
    }

    pub fn load_from(file: config::File<config::FileSourceFile, config::FileFormat>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            bail!("queue_capacity must be at least 1");
        }
        if self.detection_interval_secs == 0 || self.cleanup_interval_secs == 0 {
            bail!("detection and cleanup intervals must be positive");
        }
        if let (Some(warning), Some(critical)) = (self.thresholds.warning, self.thresholds.critical)
        {
            if warning >= critical {
                bail!("warning threshold ({warning}) must be below critical ({critical})");
            }
        }
        let t = &self.thresholds;
        let durations = [
            (KEY_SPIKE_WINDOW, t.spike_window_minutes),
            (KEY_COOLDOWN, t.cooldown_minutes),
            (KEY_RETENTION, t.retention_days),
            (KEY_ALERT_RETENTION, t.alert_retention_days),
        ];
        for (key, value) in durations {
            if let Some(reason) = value.and_then(|v| range_error(key, v)) {
                bail!("invalid threshold: {reason}");
            }
        }
        Ok(())
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            queue_capacity: self.queue_capacity,
            detection_interval: Duration::from_secs(self.detection_interval_secs),
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
            cleanup_initial_delay: Duration::from_secs(self.cleanup_initial_delay_secs),
        }
    }

    /// Settings provider seeded from the threshold overrides
    pub fn settings(&self) -> StaticSettings {
        let settings = StaticSettings::new();
        self.thresholds.seed(&settings);
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use thermal_engine::Thresholds;

    fn load_toml(contents: &str) -> Result<DaemonConfig> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        DaemonConfig::load_from(config::File::from(file.path()))
    }

    #[test]
    fn test_defaults() {
        let config = load_toml("").unwrap();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.queue_capacity, 1000);

        let processor = config.processor_config();
        assert_eq!(processor.detection_interval, Duration::from_secs(900));
        assert_eq!(processor.cleanup_interval, Duration::from_secs(86400));
        assert_eq!(processor.cleanup_initial_delay, Duration::from_secs(30));

        assert_eq!(Thresholds::load(&config.settings()), Thresholds::default());
    }

    #[test]
    fn test_threshold_overrides() {
        let config = load_toml(
            r#"
            db_path = "/var/lib/thermwatch/temps.db"
            queue_capacity = 50

            [thresholds]
            warning = 40
            critical = 50
            cooldown_minutes = 15
            alerting_enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/var/lib/thermwatch/temps.db"));
        assert_eq!(config.queue_capacity, 50);

        let thresholds = Thresholds::load(&config.settings());
        assert_eq!(thresholds.warning, 40);
        assert_eq!(thresholds.critical, 50);
        assert_eq!(thresholds.cooldown_minutes, 15);
        assert!(!thresholds.alerting_enabled);
        assert_eq!(thresholds.spike_threshold, 10);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let err = load_toml("[thresholds]\nwarning = 60\ncritical = 50\n").unwrap_err();
        assert!(err.to_string().contains("must be below critical"));
    }

    #[test]
    fn test_rejects_non_positive_retention() {
        let err = load_toml("[thresholds]\nretention_days = 0\n").unwrap_err();
        assert!(err.to_string().contains("retention_days must be at least 1"));

        assert!(load_toml("[thresholds]\nalert_retention_days = -7\n").is_err());
        assert!(load_toml("[thresholds]\ncooldown_minutes = -1\n").is_err());
        assert!(load_toml("[thresholds]\ncooldown_minutes = 0\nretention_days = 1\n").is_ok());
    }

    #[test]
    fn test_rejects_empty_queue() {
        assert!(load_toml("queue_capacity = 0").is_err());
    }
}
