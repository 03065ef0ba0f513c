//! Spike listing, lifecycle and on-demand detection

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tabled::Tabled;
use thermal_engine::{stats::Period, Spike, SpikeFilter};

use super::Session;
use crate::output::{
    color_direction, format_bool, format_temp, format_time, print_info, print_json, print_list,
    print_success, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct SpikeRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Host")]
    hostname: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Direction")]
    direction: String,
    #[tabled(rename = "From")]
    start_temp: String,
    #[tabled(rename = "To")]
    end_temp: String,
    #[tabled(rename = "°C/min")]
    rate: String,
    #[tabled(rename = "Start")]
    start_time: String,
    #[tabled(rename = "End")]
    end_time: String,
    #[tabled(rename = "Ack")]
    acknowledged: String,
}

impl From<&Spike> for SpikeRow {
    fn from(spike: &Spike) -> Self {
        Self {
            id: spike.id,
            hostname: spike.hostname.clone(),
            serial: spike.serial.clone(),
            direction: color_direction(spike.direction),
            start_temp: format_temp(spike.start_temp),
            end_temp: format_temp(spike.end_temp),
            rate: format!("{:.2}", spike.rate_per_minute),
            start_time: format_time(spike.start_time),
            end_time: format_time(spike.end_time),
            acknowledged: format_bool(spike.acknowledged),
        }
    }
}

/// Filters accepted by `spikes list`
#[derive(Debug, Default, Args)]
pub struct ListArgs {
    #[arg(long)]
    pub hostname: Option<String>,
    #[arg(long)]
    pub serial: Option<String>,
    #[arg(long)]
    pub unacknowledged: bool,
    #[arg(long)]
    pub since: Option<Period>,
    #[arg(long, short)]
    pub limit: Option<usize>,
}

impl ListArgs {
    fn filter(self) -> SpikeFilter {
        SpikeFilter {
            hostname: self.hostname,
            serial: self.serial,
            acknowledged: self.unacknowledged.then_some(false),
            since: self.since.and_then(|p| p.since(Utc::now())),
            limit: self.limit,
        }
    }
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Host to scan (scans every drive if omitted)
    #[arg(long, requires = "serial")]
    pub hostname: Option<String>,
    #[arg(long, requires = "hostname")]
    pub serial: Option<String>,
    /// Window in minutes (defaults to the configured window)
    #[arg(long)]
    pub window: Option<i64>,
    /// Minimum change in °C (defaults to the configured threshold)
    #[arg(long)]
    pub threshold: Option<i64>,
}

pub fn list(session: &Session, args: ListArgs) -> Result<()> {
    let spikes = session.detector().get_spikes(&args.filter())?;
    let rows: Vec<SpikeRow> = spikes.iter().map(SpikeRow::from).collect();
    print_list(&spikes, rows, "spikes", session.format)
}

pub fn acknowledge(session: &Session, id: i64) -> Result<()> {
    session
        .detector()
        .acknowledge_spike(id)
        .with_context(|| format!("Failed to acknowledge spike {id}"))?;
    print_success(&format!("Spike {id} acknowledged"));
    Ok(())
}

pub fn delete(session: &Session, id: i64) -> Result<()> {
    session
        .detector()
        .delete_spike(id)
        .with_context(|| format!("Failed to delete spike {id}"))?;
    print_success(&format!("Spike {id} deleted"));
    Ok(())
}

/// Scan stored readings for new spikes and raise a spike alert for each
///
/// Window and threshold default to the configured values.
pub fn detect(session: &Session, args: DetectArgs) -> Result<()> {
    let engine = session.alert_engine();
    let thresholds = engine.thresholds();
    let window = args.window.unwrap_or(thresholds.spike_window_minutes);
    let threshold = args.threshold.unwrap_or(thresholds.spike_threshold);
    let detector = session.detector();

    let (spikes, failures) = match (args.hostname, args.serial) {
        (Some(hostname), Some(serial)) => (
            detector.detect_spikes(&hostname, &serial, window, threshold)?,
            0,
        ),
        _ => {
            let report = detector.detect_all_drives_spikes(window, threshold)?;
            (report.spikes, report.failures)
        }
    };

    for spike in &spikes {
        engine
            .create_spike_alert(spike)
            .with_context(|| format!("Failed to raise alert for spike {}", spike.id))?;
    }

    if failures > 0 {
        print_warning(&format!("{failures} drives could not be scanned"));
    }

    match session.format {
        OutputFormat::Json => print_json(&spikes),
        OutputFormat::Table if spikes.is_empty() => {
            print_info(&format!(
                "No new spikes over {threshold}°C within {window} minutes"
            ));
            Ok(())
        }
        OutputFormat::Table => {
            let rows: Vec<SpikeRow> = spikes.iter().map(SpikeRow::from).collect();
            print_list(&spikes, rows, "new spikes", session.format)
        }
    }
}
