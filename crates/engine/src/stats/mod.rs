//! Read-side temperature statistics
//!
//! Everything here is a pure function of the stored readings plus the
//! thresholds in force at call time:
//! - Per-drive descriptive statistics and trend over a lookback period
//! - Time series (raw or bucketed) for charting
//! - Fleet views: current temperatures, summary, distribution, trends

mod regression;

pub use regression::{
    classify_trend, linear_regression_slope, round_to, TrendDirection, TREND_NOISE_BAND,
};
use regression::population_std_dev;

use crate::drive_info::DriveInfoLookup;
use crate::models::{DriveInfo, DriveStatus, Reading, Thresholds};
use crate::settings::SettingsProvider;
use crate::store::{self, AlertSummary, Store};
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Lower edge of the first closed distribution bucket
const DISTRIBUTION_FLOOR: i64 = 20;
/// Lower edge of the open-ended top bucket
const DISTRIBUTION_CEILING: i64 = 65;
const DISTRIBUTION_STEP: i64 = 5;

/// Lookback period for statistics queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "all")]
    All,
}

/// Granularity of a time series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Raw,
    Hourly,
    Daily,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Hour => "1h",
            Period::SixHours => "6h",
            Period::Day => "24h",
            Period::Week => "7d",
            Period::Month => "30d",
            Period::Quarter => "90d",
            Period::All => "all",
        }
    }

    pub fn lookback(&self) -> Option<Duration> {
        match self {
            Period::Hour => Some(Duration::hours(1)),
            Period::SixHours => Some(Duration::hours(6)),
            Period::Day => Some(Duration::hours(24)),
            Period::Week => Some(Duration::days(7)),
            Period::Month => Some(Duration::days(30)),
            Period::Quarter => Some(Duration::days(90)),
            Period::All => None,
        }
    }

    /// Start of the window ending at `now`; `None` for all time
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.lookback().map(|d| now - d)
    }

    pub fn resolution(&self) -> Resolution {
        match self {
            Period::Hour | Period::SixHours | Period::Day => Resolution::Raw,
            Period::Week => Resolution::Hourly,
            Period::Month | Period::Quarter | Period::All => Resolution::Daily,
        }
    }
}

impl Default for Period {
    fn default() -> Self {
        Period::Day
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(Period::Hour),
            "6h" => Ok(Period::SixHours),
            "24h" | "1d" => Ok(Period::Day),
            "7d" => Ok(Period::Week),
            "30d" => Ok(Period::Month),
            "90d" => Ok(Period::Quarter),
            "all" => Ok(Period::All),
            other => Err(format!(
                "unknown period {other:?} (expected 1h, 6h, 24h, 7d, 30d, 90d or all)"
            )),
        }
    }
}

/// Descriptive statistics for one drive over one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureStats {
    pub hostname: String,
    pub serial: String,
    pub device_name: Option<String>,
    pub model: Option<String>,
    pub period: Period,
    pub current_temp: i64,
    pub min_temp: i64,
    pub max_temp: i64,
    pub avg_temp: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub reading_count: i64,
    pub first_reading: DateTime<Utc>,
    pub last_reading: DateTime<Utc>,
    pub trend: TrendDirection,
    pub trend_slope: f64,
}

/// One chart point; raw series have `count == 1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub avg_temp: f64,
    pub min_temp: i64,
    pub max_temp: i64,
    pub count: i64,
}

/// Latest reading of a drive with its threshold classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentTemperature {
    pub hostname: String,
    pub serial: String,
    pub temperature: i64,
    pub timestamp: DateTime<Utc>,
    pub status: DriveStatus,
    pub device_name: Option<String>,
    pub model: Option<String>,
}

/// Fleet-wide overview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub total_drives: usize,
    pub total_hosts: usize,
    pub avg_temp: Option<f64>,
    pub min_temp: Option<i64>,
    pub max_temp: Option<i64>,
    pub drives_normal: usize,
    pub drives_warning: usize,
    pub drives_critical: usize,
    pub hottest: Option<CurrentTemperature>,
    pub coolest: Option<CurrentTemperature>,
    pub active_alerts: i64,
    pub unacknowledged_spikes: i64,
    pub thresholds: Thresholds,
}

/// Histogram bucket; `min` inclusive, `max` exclusive, `None` is open-ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionBucket {
    pub label: String,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub count: usize,
}

impl DistributionBucket {
    fn contains(&self, temperature: i64) -> bool {
        self.min.map_or(true, |min| temperature >= min)
            && self.max.map_or(true, |max| temperature < max)
    }
}

/// Fitted trend for one drive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveTrend {
    pub hostname: String,
    pub serial: String,
    pub slope: f64,
    pub trend: TrendDirection,
    pub reading_count: usize,
    pub current_temp: i64,
}

/// Fit `temperature = a + b·hours` over readings sorted by time
///
/// Returns the slope rounded to 4 decimals and its classification.
pub fn fit_trend(readings: &[Reading]) -> (f64, TrendDirection) {
    let Some(first) = readings.first() else {
        return (0.0, TrendDirection::InsufficientData);
    };
    let points: Vec<(f64, f64)> = readings
        .iter()
        .map(|r| {
            let hours = (r.timestamp - first.timestamp).num_seconds() as f64 / 3600.0;
            (hours, r.temperature as f64)
        })
        .collect();
    let slope = round_to(linear_regression_slope(&points), 4);
    (slope, classify_trend(slope, points.len()))
}

/// Statistics queries over the reading store
pub struct StatisticsEngine {
    store: Store,
    settings: Arc<dyn SettingsProvider>,
    drive_info: Arc<dyn DriveInfoLookup>,
}

impl StatisticsEngine {
    pub fn new(
        store: Store,
        settings: Arc<dyn SettingsProvider>,
        drive_info: Arc<dyn DriveInfoLookup>,
    ) -> Self {
        Self {
            store,
            settings,
            drive_info,
        }
    }

    fn thresholds(&self) -> Thresholds {
        Thresholds::load(self.settings.as_ref())
    }

    fn lookup_info(&self, hostname: &str, serial: &str) -> DriveInfo {
        match self.drive_info.drive_info(hostname, serial) {
            Ok(info) => info.unwrap_or_default(),
            Err(e) => {
                debug!(hostname = %hostname, serial = %serial, error = %e, "Drive info lookup failed");
                DriveInfo::default()
            }
        }
    }

    pub fn get_stats(
        &self,
        hostname: &str,
        serial: &str,
        period: Period,
    ) -> store::Result<Option<TemperatureStats>> {
        self.get_stats_at(hostname, serial, period, Utc::now())
    }

    /// Statistics for the window ending at `now`; `None` if it holds no readings
    pub fn get_stats_at(
        &self,
        hostname: &str,
        serial: &str,
        period: Period,
        now: DateTime<Utc>,
    ) -> store::Result<Option<TemperatureStats>> {
        let since = period.since(now);

        let Some(aggregate) = self.store.window_aggregate(hostname, serial, since)? else {
            return Ok(None);
        };

        let readings = self.store.readings_since(hostname, serial, since)?;
        let (trend_slope, trend) = fit_trend(&readings);

        let temperatures: Vec<f64> = readings.iter().map(|r| r.temperature as f64).collect();
        let std_dev = population_std_dev(&temperatures);
        let variance = std_dev * std_dev;

        let (Some(first), Some(last)) = (readings.first(), readings.last()) else {
            return Ok(None);
        };

        let current_temp = self
            .store
            .latest_reading(hostname, serial)?
            .map(|r| r.temperature)
            .unwrap_or(last.temperature);

        let info = self.lookup_info(hostname, serial);

        Ok(Some(TemperatureStats {
            hostname: hostname.to_string(),
            serial: serial.to_string(),
            device_name: info.device_name,
            model: info.model,
            period,
            current_temp,
            min_temp: aggregate.min,
            max_temp: aggregate.max,
            avg_temp: round_to(aggregate.mean, 2),
            variance: round_to(variance, 2),
            std_dev: round_to(std_dev, 2),
            reading_count: aggregate.count,
            first_reading: first.timestamp,
            last_reading: last.timestamp,
            trend,
            trend_slope,
        }))
    }

    pub fn get_time_series(
        &self,
        hostname: &str,
        serial: &str,
        period: Period,
    ) -> store::Result<Vec<TimeSeriesPoint>> {
        self.get_time_series_at(hostname, serial, period, Utc::now())
    }

    pub fn get_time_series_at(
        &self,
        hostname: &str,
        serial: &str,
        period: Period,
        now: DateTime<Utc>,
    ) -> store::Result<Vec<TimeSeriesPoint>> {
        let readings = self.store.readings_since(hostname, serial, period.since(now))?;
        Ok(bucket_readings(&readings, period.resolution()))
    }

    /// Latest reading of every drive, optionally for a single host
    pub fn get_current(&self, hostname: Option<&str>) -> store::Result<Vec<CurrentTemperature>> {
        let thresholds = self.thresholds();
        let latest = self.store.latest_readings(hostname)?;
        Ok(latest
            .into_iter()
            .map(|r| {
                let info = self.lookup_info(&r.hostname, &r.serial);
                CurrentTemperature {
                    status: DriveStatus::classify(r.temperature, &thresholds),
                    hostname: r.hostname,
                    serial: r.serial,
                    temperature: r.temperature,
                    timestamp: r.timestamp,
                    device_name: info.device_name,
                    model: info.model,
                }
            })
            .collect())
    }

    pub fn get_summary(&self) -> store::Result<FleetSummary> {
        self.get_summary_at(Utc::now())
    }

    pub fn get_summary_at(&self, now: DateTime<Utc>) -> store::Result<FleetSummary> {
        let thresholds = self.thresholds();
        let current = self.get_current(None)?;
        let AlertSummary { unacknowledged, .. } = self.store.alert_summary(now)?;
        let unacknowledged_spikes = self.store.count_unacknowledged_spikes()?;

        let hosts: HashSet<&str> = current.iter().map(|c| c.hostname.as_str()).collect();
        let count_status =
            |status: DriveStatus| current.iter().filter(|c| c.status == status).count();

        let avg_temp = if current.is_empty() {
            None
        } else {
            let sum: i64 = current.iter().map(|c| c.temperature).sum();
            Some(round_to(sum as f64 / current.len() as f64, 2))
        };

        Ok(FleetSummary {
            total_drives: current.len(),
            total_hosts: hosts.len(),
            avg_temp,
            min_temp: current.iter().map(|c| c.temperature).min(),
            max_temp: current.iter().map(|c| c.temperature).max(),
            drives_normal: count_status(DriveStatus::Normal),
            drives_warning: count_status(DriveStatus::Warning),
            drives_critical: count_status(DriveStatus::Critical),
            hottest: current.iter().max_by_key(|c| c.temperature).cloned(),
            coolest: current.iter().min_by_key(|c| c.temperature).cloned(),
            active_alerts: unacknowledged,
            unacknowledged_spikes,
            thresholds,
        })
    }

    /// Histogram of current drive temperatures in fixed 5°C buckets
    pub fn get_distribution(&self) -> store::Result<Vec<DistributionBucket>> {
        let latest = self.store.latest_readings(None)?;
        let mut buckets = distribution_buckets();
        for reading in &latest {
            if let Some(bucket) = buckets.iter_mut().find(|b| b.contains(reading.temperature)) {
                bucket.count += 1;
            }
        }
        Ok(buckets)
    }

    pub fn get_trends(&self, period: Period) -> store::Result<Vec<DriveTrend>> {
        self.get_trends_at(period, Utc::now())
    }

    /// Per-drive trends, steepest first
    pub fn get_trends_at(&self, period: Period, now: DateTime<Utc>) -> store::Result<Vec<DriveTrend>> {
        let since = period.since(now);
        let mut trends = Vec::new();

        for (hostname, serial) in self.store.distinct_drives()? {
            let readings = self.store.readings_since(&hostname, &serial, since)?;
            let Some(last) = readings.last() else {
                continue;
            };
            let current_temp = last.temperature;
            let (slope, trend) = fit_trend(&readings);
            trends.push(DriveTrend {
                hostname,
                serial,
                slope,
                trend,
                reading_count: readings.len(),
                current_temp,
            });
        }

        trends.sort_by(|a, b| {
            b.slope
                .abs()
                .partial_cmp(&a.slope.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(trends)
    }
}

fn distribution_buckets() -> Vec<DistributionBucket> {
    let mut buckets = vec![DistributionBucket {
        label: format!("<{DISTRIBUTION_FLOOR}"),
        min: None,
        max: Some(DISTRIBUTION_FLOOR),
        count: 0,
    }];
    let mut lower = DISTRIBUTION_FLOOR;
    while lower < DISTRIBUTION_CEILING {
        let upper = lower + DISTRIBUTION_STEP;
        buckets.push(DistributionBucket {
            label: format!("{}-{}", lower, upper - 1),
            min: Some(lower),
            max: Some(upper),
            count: 0,
        });
        lower = upper;
    }
    buckets.push(DistributionBucket {
        label: format!(">={DISTRIBUTION_CEILING}"),
        min: Some(DISTRIBUTION_CEILING),
        max: None,
        count: 0,
    });
    buckets
}

/// Collapse time-ordered readings into chart points
fn bucket_readings(readings: &[Reading], resolution: Resolution) -> Vec<TimeSeriesPoint> {
    let width = match resolution {
        Resolution::Raw => {
            return readings
                .iter()
                .map(|r| TimeSeriesPoint {
                    timestamp: r.timestamp,
                    avg_temp: r.temperature as f64,
                    min_temp: r.temperature,
                    max_temp: r.temperature,
                    count: 1,
                })
                .collect();
        }
        Resolution::Hourly => Duration::hours(1),
        Resolution::Daily => Duration::days(1),
    };

    let mut points: Vec<TimeSeriesPoint> = Vec::new();
    let mut sum = 0i64;

    for reading in readings {
        let start = reading
            .timestamp
            .duration_trunc(width)
            .unwrap_or(reading.timestamp);

        match points.last_mut() {
            Some(point) if point.timestamp == start => {
                sum += reading.temperature;
                point.count += 1;
                point.min_temp = point.min_temp.min(reading.temperature);
                point.max_temp = point.max_temp.max(reading.temperature);
                point.avg_temp = round_to(sum as f64 / point.count as f64, 2);
            }
            _ => {
                sum = reading.temperature;
                points.push(TimeSeriesPoint {
                    timestamp: start,
                    avg_temp: reading.temperature as f64,
                    min_temp: reading.temperature,
                    max_temp: reading.temperature,
                    count: 1,
                });
            }
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive_info::{NoDriveInfo, StaticDriveInfo};
    use crate::models::{AlertType, NewAlert};
    use crate::settings::{StaticSettings, CATEGORY_TEMPERATURE, KEY_WARNING};
    use crate::store::test_store;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn engine(store: &Store) -> StatisticsEngine {
        StatisticsEngine::new(
            store.clone(),
            Arc::new(StaticSettings::new()),
            Arc::new(NoDriveInfo),
        )
    }

    #[test]
    fn test_stats_known_sample() {
        let (_dir, store) = test_store();
        let temps = [35, 36, 38, 40, 42, 44, 45, 43, 41, 39];
        for (i, t) in temps.iter().enumerate() {
            let at = now() - Duration::minutes(50) + Duration::minutes(i as i64 * 5);
            store.insert_reading("nas01", "SN1", *t, at).unwrap();
        }

        let stats = engine(&store)
            .get_stats_at("nas01", "SN1", Period::Hour, now())
            .unwrap()
            .unwrap();

        assert_eq!(stats.reading_count, 10);
        assert_eq!(stats.min_temp, 35);
        assert_eq!(stats.max_temp, 45);
        assert_eq!(stats.avg_temp, 40.3);
        assert_eq!(stats.variance, 10.01);
        let expected = (100.1f64 / 10.0).sqrt();
        assert!((stats.std_dev - expected).abs() < 0.01);
        assert_eq!(stats.current_temp, 39);
        assert_eq!(stats.period, Period::Hour);
    }

    #[test]
    fn test_stats_empty_window() {
        let (_dir, store) = test_store();
        store
            .insert_reading("nas01", "SN1", 40, now() - Duration::days(2))
            .unwrap();
        let engine = engine(&store);
        assert!(engine
            .get_stats_at("nas01", "SN1", Period::Day, now())
            .unwrap()
            .is_none());
        assert!(engine
            .get_stats_at("nas01", "SN1", Period::All, now())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_single_reading() {
        let (_dir, store) = test_store();
        store
            .insert_reading("nas01", "SN1", 41, now() - Duration::minutes(5))
            .unwrap();
        let stats = engine(&store)
            .get_stats_at("nas01", "SN1", Period::Hour, now())
            .unwrap()
            .unwrap();
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.trend, TrendDirection::InsufficientData);
    }

    #[test]
    fn test_current_is_latest_ever() {
        let (_dir, store) = test_store();
        store
            .insert_reading("nas01", "SN1", 30, now() - Duration::hours(3))
            .unwrap();
        store
            .insert_reading("nas01", "SN1", 50, now() + Duration::minutes(30))
            .unwrap();

        // Current comes from the newest reading overall, not the window start
        let stats = engine(&store)
            .get_stats_at("nas01", "SN1", Period::SixHours, now())
            .unwrap()
            .unwrap();
        assert_eq!(stats.reading_count, 2);
        assert_eq!(stats.current_temp, 50);
    }

    #[test]
    fn test_heating_trend() {
        let (_dir, store) = test_store();
        // +1°C every 30 minutes = 2°C/hour
        for i in 0..6 {
            let at = now() - Duration::hours(3) + Duration::minutes(i * 30);
            store.insert_reading("nas01", "SN1", 35 + i, at).unwrap();
        }
        let stats = engine(&store)
            .get_stats_at("nas01", "SN1", Period::SixHours, now())
            .unwrap()
            .unwrap();
        assert_eq!(stats.trend, TrendDirection::Heating);
        assert!((stats.trend_slope - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_drive_info_attached() {
        let (_dir, store) = test_store();
        store
            .insert_reading("nas01", "SN1", 40, now() - Duration::minutes(1))
            .unwrap();
        let info = DriveInfo {
            device_name: Some("sda".to_string()),
            model: Some("ST4000VN008".to_string()),
        };
        let engine = StatisticsEngine::new(
            store.clone(),
            Arc::new(StaticSettings::new()),
            Arc::new(StaticDriveInfo::new().with("nas01", "SN1", info)),
        );
        let stats = engine
            .get_stats_at("nas01", "SN1", Period::Hour, now())
            .unwrap()
            .unwrap();
        assert_eq!(stats.device_name.as_deref(), Some("sda"));
        assert_eq!(stats.model.as_deref(), Some("ST4000VN008"));
    }

    #[test]
    fn test_time_series_hourly_buckets() {
        let (_dir, store) = test_store();
        let hour = Utc.with_ymd_and_hms(2024, 5, 30, 10, 0, 0).unwrap();
        for (offset, temp) in [(0, 40), (20, 42), (40, 44), (70, 50)] {
            store
                .insert_reading("nas01", "SN1", temp, hour + Duration::minutes(offset))
                .unwrap();
        }

        let series = engine(&store)
            .get_time_series_at("nas01", "SN1", Period::Week, now())
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].timestamp, hour);
        assert_eq!(series[0].count, 3);
        assert_eq!(series[0].avg_temp, 42.0);
        assert_eq!(series[0].min_temp, 40);
        assert_eq!(series[0].max_temp, 44);
        assert_eq!(series[1].count, 1);

        let raw = engine(&store)
            .get_time_series_at("nas01", "SN1", Period::All, now())
            .unwrap();
        assert_eq!(raw.len(), 1, "all-time series is bucketed daily");
    }

    #[test]
    fn test_current_and_summary() {
        let (_dir, store) = test_store();
        let at = now() - Duration::minutes(1);
        store.insert_reading("nas01", "SN1", 35, at).unwrap();
        store.insert_reading("nas01", "SN2", 47, at).unwrap();
        store.insert_reading("nas02", "SN3", 58, at).unwrap();
        store
            .insert_alert(&NewAlert {
                hostname: "nas02".to_string(),
                serial: "SN3".to_string(),
                alert_type: AlertType::Critical,
                temperature: 58,
                threshold: 55,
                message: "hot".to_string(),
                created_at: at,
            })
            .unwrap();

        let engine = engine(&store);
        let current = engine.get_current(None).unwrap();
        let statuses: Vec<DriveStatus> = current.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![DriveStatus::Normal, DriveStatus::Warning, DriveStatus::Critical]
        );

        let summary = engine.get_summary_at(now()).unwrap();
        assert_eq!(summary.total_drives, 3);
        assert_eq!(summary.total_hosts, 2);
        assert_eq!(summary.drives_critical, 1);
        assert_eq!(summary.max_temp, Some(58));
        assert_eq!(summary.hottest.unwrap().serial, "SN3");
        assert_eq!(summary.coolest.unwrap().serial, "SN1");
        assert_eq!(summary.avg_temp, Some(46.67));
        assert_eq!(summary.active_alerts, 1);
    }

    #[test]
    fn test_summary_uses_live_thresholds() {
        let (_dir, store) = test_store();
        store
            .insert_reading("nas01", "SN1", 42, now() - Duration::minutes(1))
            .unwrap();
        let settings = Arc::new(StaticSettings::new());
        let engine = StatisticsEngine::new(store.clone(), settings.clone(), Arc::new(NoDriveInfo));

        assert_eq!(engine.get_summary_at(now()).unwrap().drives_normal, 1);
        settings.set_int(CATEGORY_TEMPERATURE, KEY_WARNING, 40);
        assert_eq!(engine.get_summary_at(now()).unwrap().drives_warning, 1);
    }

    #[test]
    fn test_distribution() {
        let (_dir, store) = test_store();
        let at = now() - Duration::minutes(1);
        for (serial, temp) in [("A", 18), ("B", 34), ("C", 30), ("D", 70)] {
            store.insert_reading("nas01", serial, temp, at).unwrap();
        }

        let buckets = engine(&store).get_distribution().unwrap();
        assert_eq!(buckets.first().unwrap().label, "<20");
        assert_eq!(buckets.last().unwrap().label, ">=65");
        assert_eq!(buckets.len(), 11);

        let count = |label: &str| buckets.iter().find(|b| b.label == label).unwrap().count;
        assert_eq!(count("<20"), 1);
        assert_eq!(count("30-34"), 2);
        assert_eq!(count(">=65"), 1);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), 4);
    }

    #[test]
    fn test_trends_sorted_by_steepness() {
        let (_dir, store) = test_store();
        for i in 0..4 {
            let at = now() - Duration::hours(4) + Duration::hours(i);
            store.insert_reading("nas01", "FLAT", 40, at).unwrap();
            store.insert_reading("nas01", "COOL", 50 - 3 * i, at).unwrap();
            store.insert_reading("nas01", "WARM", 40 + i, at).unwrap();
        }
        store
            .insert_reading("nas01", "OLD", 40, now() - Duration::days(3))
            .unwrap();

        let trends = engine(&store).get_trends_at(Period::Day, now()).unwrap();
        let order: Vec<&str> = trends.iter().map(|t| t.serial.as_str()).collect();
        assert_eq!(order, vec!["COOL", "WARM", "FLAT"]);
        assert_eq!(trends[0].trend, TrendDirection::Cooling);
        assert_eq!(trends[0].current_temp, 41);
        assert_eq!(trends[2].trend, TrendDirection::Stable);
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("7d".parse::<Period>().unwrap(), Period::Week);
        assert_eq!("all".parse::<Period>().unwrap().lookback(), None);
        assert!("2w".parse::<Period>().is_err());
    }
}
