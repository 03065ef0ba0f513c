//! Rapid temperature change detection
//!
//! A spike is a move of more than `threshold` degrees away from the lowest
//! (heating) or highest (cooling) reading seen so far in the scan window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{NewSpike, Reading, Spike, SpikeDirection};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::stats::round_to;
use crate::store::{self, SpikeFilter, Store};

/// Running extremum tracked while scanning a window
#[derive(Debug, Clone, Copy)]
struct Extremum {
    temperature: i64,
    at: DateTime<Utc>,
}

impl Extremum {
    fn of(reading: &Reading) -> Self {
        Self {
            temperature: reading.temperature,
            at: reading.timestamp,
        }
    }
}

fn candidate(from: Extremum, to: &Reading) -> NewSpike {
    let magnitude = (to.temperature - from.temperature).abs();
    let direction = if to.temperature > from.temperature {
        SpikeDirection::Heating
    } else {
        SpikeDirection::Cooling
    };
    let elapsed_minutes = (to.timestamp - from.at).num_seconds() as f64 / 60.0;

    NewSpike {
        hostname: to.hostname.clone(),
        serial: to.serial.clone(),
        start_time: from.at,
        end_time: to.timestamp,
        start_temp: from.temperature,
        end_temp: to.temperature,
        magnitude,
        rate_per_minute: round_to(magnitude as f64 / elapsed_minutes.max(1.0), 2),
        direction,
    }
}

/// Scan readings (oldest first) for changes larger than `threshold`
///
/// The extremum that triggered a candidate restarts at the current reading,
/// so a single sustained ramp yields one spike rather than one per sample.
pub fn find_spike_candidates(readings: &[Reading], threshold: i64) -> Vec<NewSpike> {
    let Some(first) = readings.first() else {
        return Vec::new();
    };

    let mut low = Extremum::of(first);
    let mut high = Extremum::of(first);
    let mut found = Vec::new();

    for reading in &readings[1..] {
        if reading.temperature < low.temperature {
            low = Extremum::of(reading);
        }
        if reading.temperature > high.temperature {
            high = Extremum::of(reading);
        }

        if reading.temperature - low.temperature > threshold {
            found.push(candidate(low, reading));
            low = Extremum::of(reading);
        }
        if high.temperature - reading.temperature > threshold {
            found.push(candidate(high, reading));
            high = Extremum::of(reading);
        }
    }

    found
}

/// Outcome of a fleet-wide detection sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    pub drives_scanned: usize,
    pub spikes: Vec<Spike>,
    pub failures: usize,
}

/// Finds and records spikes in stored readings
#[derive(Debug, Clone)]
pub struct SpikeDetector {
    store: Store,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl SpikeDetector {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::default(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// New spikes for one drive within the trailing window, oldest first
    pub fn detect_spikes(
        &self,
        hostname: &str,
        serial: &str,
        window_minutes: i64,
        threshold: i64,
    ) -> store::Result<Vec<Spike>> {
        self.detect_spikes_at(hostname, serial, window_minutes, threshold, Utc::now())
    }

    pub fn detect_spikes_at(
        &self,
        hostname: &str,
        serial: &str,
        window_minutes: i64,
        threshold: i64,
        now: DateTime<Utc>,
    ) -> store::Result<Vec<Spike>> {
        if window_minutes < 1 {
            return Ok(Vec::new());
        }
        // A window too wide to represent covers all history
        let since = Duration::try_minutes(window_minutes).and_then(|w| now.checked_sub_signed(w));
        let readings = self.store.readings_since(hostname, serial, since)?;

        let mut recorded = Vec::new();
        for spike in find_spike_candidates(&readings, threshold) {
            if self
                .store
                .spike_exists(hostname, serial, spike.start_time, spike.end_time)?
            {
                continue;
            }
            // A concurrent sweep may have won the race; the unique index decides
            if let Some(stored) = self.store.insert_spike(&spike, now)? {
                self.logger.log_spike_detected(&stored);
                recorded.push(stored);
            }
        }

        if !recorded.is_empty() {
            self.metrics.add_spikes_detected(recorded.len() as u64);
        }
        debug!(
            hostname = %hostname,
            serial = %serial,
            readings = readings.len(),
            new_spikes = recorded.len(),
            "Scanned drive for spikes"
        );
        Ok(recorded)
    }

    /// Run detection for every drive with stored readings
    ///
    /// A failing drive is logged and counted; the sweep carries on.
    pub fn detect_all_drives_spikes(
        &self,
        window_minutes: i64,
        threshold: i64,
    ) -> store::Result<SweepReport> {
        self.detect_all_drives_spikes_at(window_minutes, threshold, Utc::now())
    }

    pub fn detect_all_drives_spikes_at(
        &self,
        window_minutes: i64,
        threshold: i64,
        now: DateTime<Utc>,
    ) -> store::Result<SweepReport> {
        let drives = self.store.distinct_drives()?;
        let mut report = SweepReport {
            drives_scanned: drives.len(),
            ..Default::default()
        };

        for (hostname, serial) in drives {
            match self.detect_spikes_at(&hostname, &serial, window_minutes, threshold, now) {
                Ok(spikes) => report.spikes.extend(spikes),
                Err(e) => {
                    warn!(
                        hostname = %hostname,
                        serial = %serial,
                        error = %e,
                        "Spike detection failed for drive"
                    );
                    self.metrics.inc_sweep_failures();
                    report.failures += 1;
                }
            }
        }

        self.logger
            .log_sweep_completed(report.drives_scanned, report.spikes.len(), report.failures);
        Ok(report)
    }

    pub fn get_spikes(&self, filter: &SpikeFilter) -> store::Result<Vec<Spike>> {
        self.store.get_spikes(filter)
    }

    pub fn acknowledge_spike(&self, id: i64) -> store::Result<()> {
        self.store.acknowledge_spike(id)
    }

    pub fn delete_spike(&self, id: i64) -> store::Result<()> {
        self.store.delete_spike(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_store;
    use chrono::TimeZone;

    // 35°C to 50°C in ten one-minute steps
    const RAMP: [i64; 11] = [35, 36, 38, 39, 41, 42, 44, 45, 47, 48, 50];

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn readings(temps: &[i64]) -> Vec<Reading> {
        temps
            .iter()
            .enumerate()
            .map(|(i, &temperature)| Reading {
                id: i as i64 + 1,
                hostname: "nas01".to_string(),
                serial: "SN1".to_string(),
                temperature,
                timestamp: base() + Duration::minutes(i as i64),
            })
            .collect()
    }

    fn seed(store: &Store, temps: &[i64]) {
        for reading in readings(temps) {
            store
                .insert_reading(
                    &reading.hostname,
                    &reading.serial,
                    reading.temperature,
                    reading.timestamp,
                )
                .unwrap();
        }
    }

    #[test]
    fn test_heating_ramp_is_one_spike() {
        let spikes = find_spike_candidates(&readings(&RAMP), 10);
        assert_eq!(spikes.len(), 1);

        let spike = &spikes[0];
        assert_eq!(spike.direction, SpikeDirection::Heating);
        assert_eq!(spike.start_temp, 35);
        assert_eq!(spike.end_temp, 47);
        assert!(spike.magnitude >= 10);
        assert_eq!(spike.start_time, base());
        assert_eq!(spike.end_time, base() + Duration::minutes(8));
        assert_eq!(spike.rate_per_minute, 1.5);
    }

    #[test]
    fn test_cooling_ramp_is_one_spike() {
        let mut temps = RAMP;
        temps.reverse();
        let spikes = find_spike_candidates(&readings(&temps), 10);

        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].direction, SpikeDirection::Cooling);
        assert_eq!(spikes[0].start_temp, 50);
        assert_eq!(spikes[0].end_temp, 38);
        assert_eq!(spikes[0].magnitude, 12);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        assert!(find_spike_candidates(&readings(&[40, 50]), 10).is_empty());
        assert_eq!(find_spike_candidates(&readings(&[40, 51]), 10).len(), 1);
    }

    #[test]
    fn test_short_jump_uses_one_minute_floor() {
        let mut pair = readings(&[30, 45]);
        pair[1].timestamp = pair[0].timestamp + Duration::seconds(20);

        let spikes = find_spike_candidates(&pair, 10);
        assert_eq!(spikes[0].rate_per_minute, 15.0);
    }

    #[test]
    fn test_flat_and_empty_inputs() {
        assert!(find_spike_candidates(&[], 10).is_empty());
        assert!(find_spike_candidates(&readings(&[40]), 10).is_empty());
        assert!(find_spike_candidates(&readings(&[40, 41, 39, 42, 40]), 10).is_empty());
    }

    #[test]
    fn test_detect_persists_once() {
        let (_dir, store) = test_store();
        seed(&store, &RAMP);
        let detector = SpikeDetector::new(store.clone());
        let now = base() + Duration::minutes(10);

        let first = detector.detect_spikes_at("nas01", "SN1", 30, 10, now).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].direction, SpikeDirection::Heating);
        assert!(first[0].magnitude >= 10);

        let again = detector.detect_spikes_at("nas01", "SN1", 30, 10, now).unwrap();
        assert!(again.is_empty());
        assert_eq!(store.get_spikes(&SpikeFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_window_excludes_old_readings() {
        let (_dir, store) = test_store();
        seed(&store, &RAMP);
        let detector = SpikeDetector::new(store);

        // Only the last five readings (44..50) fall inside a 5 minute window
        let now = base() + Duration::minutes(11);
        let spikes = detector.detect_spikes_at("nas01", "SN1", 5, 10, now).unwrap();
        assert!(spikes.is_empty());
    }

    #[test]
    fn test_out_of_range_windows() {
        let (_dir, store) = test_store();
        seed(&store, &RAMP);
        let detector = SpikeDetector::new(store);
        let now = base() + Duration::minutes(10);

        assert!(detector.detect_spikes_at("nas01", "SN1", 0, 10, now).unwrap().is_empty());
        assert!(detector.detect_spikes_at("nas01", "SN1", -30, 10, now).unwrap().is_empty());

        let spikes = detector
            .detect_spikes_at("nas01", "SN1", i64::MAX, 10, now)
            .unwrap();
        assert_eq!(spikes.len(), 1);
    }

    #[test]
    fn test_sweep_covers_all_drives() {
        let (_dir, store) = test_store();
        seed(&store, &RAMP);
        let mut temps = RAMP;
        temps.reverse();
        for (i, temp) in temps.iter().enumerate() {
            store
                .insert_reading("nas02", "SN9", *temp, base() + Duration::minutes(i as i64))
                .unwrap();
        }

        let detector = SpikeDetector::new(store);
        let now = base() + Duration::minutes(10);
        let report = detector.detect_all_drives_spikes_at(30, 10, now).unwrap();

        assert_eq!(report.drives_scanned, 2);
        assert_eq!(report.failures, 0);
        assert_eq!(report.spikes.len(), 2);

        let rescan = detector.detect_all_drives_spikes_at(30, 10, now).unwrap();
        assert!(rescan.spikes.is_empty());
    }

    #[test]
    fn test_spike_lifecycle() {
        let (_dir, store) = test_store();
        seed(&store, &RAMP);
        let detector = SpikeDetector::new(store);
        let now = base() + Duration::minutes(10);
        let spike = detector
            .detect_spikes_at("nas01", "SN1", 30, 10, now)
            .unwrap()
            .remove(0);

        detector.acknowledge_spike(spike.id).unwrap();
        let open = SpikeFilter {
            acknowledged: Some(false),
            ..Default::default()
        };
        assert!(detector.get_spikes(&open).unwrap().is_empty());

        detector.delete_spike(spike.id).unwrap();
        assert!(detector.delete_spike(spike.id).unwrap_err().is_not_found());
    }
}
