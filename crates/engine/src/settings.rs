//! Settings access for thresholds and operational parameters
//!
//! The engine never caches threshold values: every evaluation calls
//! [`Thresholds::load`], which asks the [`SettingsProvider`] and falls back
//! to the built-in defaults for anything missing.

use crate::models::Thresholds;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Category holding temperature thresholds and retention
pub const CATEGORY_TEMPERATURE: &str = "temperature";
/// Category holding global alerting switches
pub const CATEGORY_ALERTS: &str = "alerts";

pub const KEY_WARNING: &str = "warning_threshold";
pub const KEY_CRITICAL: &str = "critical_threshold";
pub const KEY_SPIKE_THRESHOLD: &str = "spike_threshold";
pub const KEY_SPIKE_WINDOW: &str = "spike_window_minutes";
pub const KEY_COOLDOWN: &str = "alert_cooldown_minutes";
pub const KEY_RECOVERY: &str = "recovery_alerts";
pub const KEY_RETENTION: &str = "retention_days";
pub const KEY_ALERT_RETENTION: &str = "alert_retention_days";
pub const KEY_ENABLED: &str = "enabled";

/// Upper bound for the cooldown and the spike window (one year)
pub const MAX_WINDOW_MINUTES: i64 = 365 * 24 * 60;
/// Upper bound for either retention period
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Source of configuration values
///
/// Implementations return `None` when a value is absent or could not be
/// read; callers treat both the same way.
pub trait SettingsProvider: Send + Sync {
    fn get_int(&self, category: &str, key: &str) -> Option<i64>;
    fn get_bool(&self, category: &str, key: &str) -> Option<bool>;
}

impl Thresholds {
    /// Read the current thresholds, substituting defaults for missing values
    pub fn load(settings: &dyn SettingsProvider) -> Self {
        let defaults = Thresholds::default();
        let int = |category: &str, key: &str, fallback: i64| {
            settings.get_int(category, key).unwrap_or(fallback)
        };
        let flag = |category: &str, key: &str, fallback: bool| {
            settings.get_bool(category, key).unwrap_or(fallback)
        };

        Self {
            warning: int(CATEGORY_TEMPERATURE, KEY_WARNING, defaults.warning),
            critical: int(CATEGORY_TEMPERATURE, KEY_CRITICAL, defaults.critical),
            spike_threshold: int(
                CATEGORY_TEMPERATURE,
                KEY_SPIKE_THRESHOLD,
                defaults.spike_threshold,
            ),
            spike_window_minutes: positive(
                int(
                    CATEGORY_TEMPERATURE,
                    KEY_SPIKE_WINDOW,
                    defaults.spike_window_minutes,
                ),
                defaults.spike_window_minutes,
                MAX_WINDOW_MINUTES,
            ),
            cooldown_minutes: int(CATEGORY_TEMPERATURE, KEY_COOLDOWN, defaults.cooldown_minutes)
                .clamp(0, MAX_WINDOW_MINUTES),
            recovery_enabled: flag(CATEGORY_TEMPERATURE, KEY_RECOVERY, defaults.recovery_enabled),
            alerting_enabled: flag(CATEGORY_ALERTS, KEY_ENABLED, defaults.alerting_enabled),
            temperature_retention_days: positive(
                int(
                    CATEGORY_TEMPERATURE,
                    KEY_RETENTION,
                    defaults.temperature_retention_days,
                ),
                defaults.temperature_retention_days,
                MAX_RETENTION_DAYS,
            ),
            alert_retention_days: positive(
                int(
                    CATEGORY_TEMPERATURE,
                    KEY_ALERT_RETENTION,
                    defaults.alert_retention_days,
                ),
                defaults.alert_retention_days,
                MAX_RETENTION_DAYS,
            ),
        }
    }
}

/// A window or retention must be at least 1; anything else falls back
fn positive(value: i64, fallback: i64, max: i64) -> i64 {
    if value < 1 {
        fallback
    } else {
        value.min(max)
    }
}

/// Why `value` cannot be stored under `key`, if it cannot
///
/// [`Thresholds::load`] falls back to the default for these values.
pub fn range_error(key: &str, value: i64) -> Option<String> {
    match key {
        KEY_SPIKE_WINDOW | KEY_RETENTION | KEY_ALERT_RETENTION if value < 1 => {
            Some(format!("{key} must be at least 1, got {value}"))
        }
        KEY_COOLDOWN if value < 0 => Some(format!("{key} must not be negative, got {value}")),
        _ => None,
    }
}

/// A single configured value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
}

/// In-memory settings map, mutable at runtime
#[derive(Debug, Default)]
pub struct StaticSettings {
    values: RwLock<HashMap<(String, String), SettingValue>>,
}

impl StaticSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a `category -> key -> value` table
    pub fn from_table(table: &HashMap<String, HashMap<String, SettingValue>>) -> Self {
        let settings = Self::new();
        for (category, entries) in table {
            for (key, value) in entries {
                settings.set(category, key, *value);
            }
        }
        settings
    }

    pub fn set(&self, category: &str, key: &str, value: SettingValue) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert((category.to_string(), key.to_string()), value);
    }

    pub fn set_int(&self, category: &str, key: &str, value: i64) {
        self.set(category, key, SettingValue::Int(value));
    }

    pub fn set_bool(&self, category: &str, key: &str, value: bool) {
        self.set(category, key, SettingValue::Bool(value));
    }

    pub fn remove(&self, category: &str, key: &str) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.remove(&(category.to_string(), key.to_string()));
    }

    fn get(&self, category: &str, key: &str) -> Option<SettingValue> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(&(category.to_string(), key.to_string())).copied()
    }
}

impl SettingsProvider for StaticSettings {
    fn get_int(&self, category: &str, key: &str) -> Option<i64> {
        match self.get(category, key)? {
            SettingValue::Int(v) => Some(v),
            SettingValue::Bool(_) => None,
        }
    }

    fn get_bool(&self, category: &str, key: &str) -> Option<bool> {
        match self.get(category, key)? {
            SettingValue::Bool(v) => Some(v),
            // Stored as 0/1 by some writers
            SettingValue::Int(v) => Some(v != 0),
        }
    }
}
