//! Core data models for the temperature engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single temperature sample reported for a drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub hostname: String,
    pub serial: String,
    pub temperature: i64,
    pub timestamp: DateTime<Utc>,
}

/// Direction of a temperature change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpikeDirection {
    Heating,
    Cooling,
}

impl SpikeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpikeDirection::Heating => "heating",
            SpikeDirection::Cooling => "cooling",
        }
    }
}

impl fmt::Display for SpikeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpikeDirection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heating" => Ok(SpikeDirection::Heating),
            "cooling" => Ok(SpikeDirection::Cooling),
            other => Err(ParseEnumError::new("spike direction", other)),
        }
    }
}

/// A rapid temperature change recorded by the spike detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spike {
    pub id: i64,
    pub hostname: String,
    pub serial: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_temp: i64,
    pub end_temp: i64,
    pub magnitude: i64,
    pub rate_per_minute: f64,
    pub direction: SpikeDirection,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}

/// Spike candidate produced by the detector, before persistence
#[derive(Debug, Clone, PartialEq)]
pub struct NewSpike {
    pub hostname: String,
    pub serial: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_temp: i64,
    pub end_temp: i64,
    pub magnitude: i64,
    pub rate_per_minute: f64,
    pub direction: SpikeDirection,
}

/// Alert type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Warning,
    Critical,
    Spike,
    Recovery,
}

impl AlertType {
    pub const ALL: [AlertType; 4] = [
        AlertType::Warning,
        AlertType::Critical,
        AlertType::Spike,
        AlertType::Recovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Warning => "warning",
            AlertType::Critical => "critical",
            AlertType::Spike => "spike",
            AlertType::Recovery => "recovery",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warning" => Ok(AlertType::Warning),
            "critical" => Ok(AlertType::Critical),
            "spike" => Ok(AlertType::Spike),
            "recovery" => Ok(AlertType::Recovery),
            other => Err(ParseEnumError::new("alert type", other)),
        }
    }
}

/// A persisted alert record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub hostname: String,
    pub serial: String,
    pub alert_type: AlertType,
    pub temperature: i64,
    pub threshold: i64,
    pub message: String,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Alert fields before persistence assigns an id
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub hostname: String,
    pub serial: String,
    pub alert_type: AlertType,
    pub temperature: i64,
    pub threshold: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Temperature state of a drive relative to the configured thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveStatus {
    Normal,
    Warning,
    Critical,
}

impl DriveStatus {
    /// Classify a temperature, critical taking priority over warning
    pub fn classify(temperature: i64, thresholds: &Thresholds) -> Self {
        if temperature >= thresholds.critical {
            DriveStatus::Critical
        } else if temperature >= thresholds.warning {
            DriveStatus::Warning
        } else {
            DriveStatus::Normal
        }
    }

    /// Alert type raised when a drive enters this state
    pub fn alert_type(&self) -> Option<AlertType> {
        match self {
            DriveStatus::Normal => None,
            DriveStatus::Warning => Some(AlertType::Warning),
            DriveStatus::Critical => Some(AlertType::Critical),
        }
    }
}

impl fmt::Display for DriveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveStatus::Normal => f.write_str("normal"),
            DriveStatus::Warning => f.write_str("warning"),
            DriveStatus::Critical => f.write_str("critical"),
        }
    }
}

/// Threshold and operational settings, read fresh on every evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub warning: i64,
    pub critical: i64,
    pub spike_threshold: i64,
    pub spike_window_minutes: i64,
    pub cooldown_minutes: i64,
    pub recovery_enabled: bool,
    pub alerting_enabled: bool,
    pub temperature_retention_days: i64,
    pub alert_retention_days: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 45,
            critical: 55,
            spike_threshold: 10,
            spike_window_minutes: 30,
            cooldown_minutes: 60,
            recovery_enabled: true,
            alerting_enabled: true,
            temperature_retention_days: 90,
            alert_retention_days: 365,
        }
    }
}

/// Optional device metadata for a drive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveInfo {
    pub device_name: Option<String>,
    pub model: Option<String>,
}

/// Error returned when a stored enum value is not recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}
