//! Temperature statistics commands

use anyhow::Result;
use clap::Args;
use tabled::Tabled;
use thermal_engine::stats::{CurrentTemperature, Period};

use super::Session;
use crate::output::{
    color_status, color_trend, format_optional, format_temp, format_time, print_json, print_list,
    print_warning, render_table, FieldRow, OutputFormat,
};

/// One drive and a lookback period
#[derive(Debug, Args)]
pub struct DriveArgs {
    /// Host the drive is attached to
    pub hostname: String,
    /// Drive serial number
    pub serial: String,
    /// Lookback period (1h, 6h, 24h, 7d, 30d, 90d, all)
    #[arg(long, short, default_value = "24h")]
    pub period: Period,
}

#[derive(Tabled)]
struct CurrentRow {
    #[tabled(rename = "Host")]
    hostname: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

#[derive(Tabled)]
struct SeriesRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Avg")]
    avg: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Samples")]
    count: i64,
}

#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "Host")]
    hostname: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Slope (°C/h)")]
    slope: String,
    #[tabled(rename = "Trend")]
    trend: String,
    #[tabled(rename = "Readings")]
    readings: usize,
    #[tabled(rename = "Current")]
    current: String,
}

#[derive(Tabled)]
struct BucketRow {
    #[tabled(rename = "Range")]
    label: String,
    #[tabled(rename = "Drives")]
    count: usize,
    #[tabled(rename = "")]
    bar: String,
}

/// Descriptive statistics for one drive
pub fn show_stats(session: &Session, drive: &DriveArgs) -> Result<()> {
    let DriveArgs {
        hostname,
        serial,
        period,
    } = drive;
    let Some(stats) = session.statistics().get_stats(hostname, serial, *period)? else {
        match session.format {
            OutputFormat::Json => println!("null"),
            OutputFormat::Table => print_warning(&format!(
                "No readings for {hostname}/{serial} in the last {period}"
            )),
        }
        return Ok(());
    };

    if session.format == OutputFormat::Json {
        return print_json(&stats);
    }

    let rows = vec![
        FieldRow::new("Host", &stats.hostname),
        FieldRow::new("Serial", &stats.serial),
        FieldRow::new("Device", format_optional(stats.device_name.as_deref())),
        FieldRow::new("Model", format_optional(stats.model.as_deref())),
        FieldRow::new("Period", stats.period),
        FieldRow::new("Current", format_temp(stats.current_temp)),
        FieldRow::new("Min", format_temp(stats.min_temp)),
        FieldRow::new("Max", format_temp(stats.max_temp)),
        FieldRow::new("Average", format!("{:.2}°C", stats.avg_temp)),
        FieldRow::new("Std dev", format!("{:.2}", stats.std_dev)),
        FieldRow::new("Readings", stats.reading_count),
        FieldRow::new("First", format_time(stats.first_reading)),
        FieldRow::new("Last", format_time(stats.last_reading)),
        FieldRow::new(
            "Trend",
            format!("{} ({:+.4}°C/h)", color_trend(stats.trend), stats.trend_slope),
        ),
    ];
    println!("{}", render_table(rows));
    Ok(())
}

/// Chart points for one drive
pub fn show_series(session: &Session, drive: &DriveArgs) -> Result<()> {
    let points = session
        .statistics()
        .get_time_series(&drive.hostname, &drive.serial, drive.period)?;

    let rows: Vec<SeriesRow> = points
        .iter()
        .map(|p| SeriesRow {
            timestamp: format_time(p.timestamp),
            avg: format!("{:.1}°C", p.avg_temp),
            min: format_temp(p.min_temp),
            max: format_temp(p.max_temp),
            count: p.count,
        })
        .collect();
    print_list(&points, rows, "points", session.format)
}

/// Latest temperature of every drive
pub fn show_current(session: &Session, hostname: Option<&str>) -> Result<()> {
    let current = session.statistics().get_current(hostname)?;

    let rows: Vec<CurrentRow> = current
        .iter()
        .map(|c| CurrentRow {
            hostname: c.hostname.clone(),
            serial: c.serial.clone(),
            device: format_optional(c.device_name.as_deref()),
            model: format_optional(c.model.as_deref()),
            temperature: format_temp(c.temperature),
            status: color_status(c.status),
            updated: format_time(c.timestamp),
        })
        .collect();
    print_list(&current, rows, "drives", session.format)
}

/// Fleet overview
pub fn show_summary(session: &Session) -> Result<()> {
    let summary = session.statistics().get_summary()?;

    if session.format == OutputFormat::Json {
        return print_json(&summary);
    }

    let drive = |c: &CurrentTemperature| {
        format!("{}/{} {}", c.hostname, c.serial, format_temp(c.temperature))
    };
    let average = summary.avg_temp.map(|t| format!("{t:.2}°C"));
    let hottest = summary.hottest.as_ref().map(drive);
    let coolest = summary.coolest.as_ref().map(drive);

    let rows = vec![
        FieldRow::new("Drives", summary.total_drives),
        FieldRow::new("Hosts", summary.total_hosts),
        FieldRow::new("Average", format_optional(average.as_deref())),
        FieldRow::new("Hottest", format_optional(hottest.as_deref())),
        FieldRow::new("Coolest", format_optional(coolest.as_deref())),
        FieldRow::new("Normal", summary.drives_normal),
        FieldRow::new("Warning", summary.drives_warning),
        FieldRow::new("Critical", summary.drives_critical),
        FieldRow::new("Open alerts", summary.active_alerts),
        FieldRow::new("Open spikes", summary.unacknowledged_spikes),
        FieldRow::new(
            "Thresholds",
            format!(
                "warning {} / critical {}",
                format_temp(summary.thresholds.warning),
                format_temp(summary.thresholds.critical)
            ),
        ),
    ];
    println!("{}", render_table(rows));
    Ok(())
}

/// Histogram of current temperatures
pub fn show_distribution(session: &Session) -> Result<()> {
    let buckets = session.statistics().get_distribution()?;

    let rows: Vec<BucketRow> = buckets
        .iter()
        .map(|b| BucketRow {
            label: b.label.clone(),
            count: b.count,
            bar: "█".repeat(b.count.min(60)),
        })
        .collect();
    print_list(&buckets, rows, "buckets", session.format)
}

/// Per-drive trends, steepest first
pub fn show_trends(session: &Session, period: Period) -> Result<()> {
    let trends = session.statistics().get_trends(period)?;

    let rows: Vec<TrendRow> = trends
        .iter()
        .map(|t| TrendRow {
            hostname: t.hostname.clone(),
            serial: t.serial.clone(),
            slope: format!("{:+.4}", t.slope),
            trend: color_trend(t.trend),
            readings: t.reading_count,
            current: format_temp(t.current_temp),
        })
        .collect();
    print_list(&trends, rows, "drives", session.format)
}
