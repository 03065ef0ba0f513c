//! Manual ingest, retention cleanup and CLI configuration

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use thermal_engine::settings::{range_error, SettingValue};
use thermal_engine::{retention, Alert, Thresholds};

use super::{ReadingArgs, Session};
use crate::config::{parse_setting_value, Config};
use crate::output::{
    color_alert_type, format_optional, print_info, print_json, print_success, render_table,
    FieldRow, OutputFormat,
};

#[derive(Serialize)]
struct IngestResult<'a> {
    hostname: &'a str,
    serial: &'a str,
    temperature: i64,
    alert: Option<Alert>,
}

/// Record one reading and evaluate it
pub fn ingest(session: &Session, reading: &ReadingArgs) -> Result<()> {
    let ReadingArgs {
        hostname,
        serial,
        temperature,
    } = reading;
    let temperature = *temperature;
    if hostname.trim().is_empty() || serial.trim().is_empty() {
        bail!("Hostname and serial must not be empty");
    }

    let alert = session
        .alert_engine()
        .process_reading(hostname, serial, temperature);

    match session.format {
        OutputFormat::Json => print_json(&IngestResult {
            hostname,
            serial,
            temperature,
            alert,
        }),
        OutputFormat::Table => {
            print_success(&format!("Recorded {temperature}°C for {hostname}/{serial}"));
            if let Some(alert) = alert {
                println!("{} {}", color_alert_type(alert.alert_type), alert.message);
            }
            Ok(())
        }
    }
}

/// Delete rows past their retention period
pub fn cleanup(session: &Session) -> Result<()> {
    let thresholds = Thresholds::load(session.settings.as_ref());
    let report = retention::run_cleanup(&session.store, &thresholds, Utc::now())
        .context("Cleanup failed")?;

    match session.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => {
            let rows = vec![
                FieldRow::new("Readings", report.readings_deleted),
                FieldRow::new("Spikes", report.spikes_deleted),
                FieldRow::new("Alerts", report.alerts_deleted),
            ];
            println!("{}", render_table(rows));
            print_success(&format!("Deleted {} rows", report.total()));
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct ConfigView<'a> {
    path: PathBuf,
    config: &'a Config,
    thresholds: Thresholds,
}

pub fn show_config(config: &Config, format: OutputFormat) -> Result<()> {
    let view = ConfigView {
        path: Config::config_path()?,
        config,
        thresholds: Thresholds::load(&config.settings_provider()),
    };

    if format == OutputFormat::Json {
        return print_json(&view);
    }

    let t = &view.thresholds;
    let db = config.db_path.as_ref().map(|p| p.display().to_string());
    let rows = vec![
        FieldRow::new("Config file", view.path.display()),
        FieldRow::new("Database", format_optional(db.as_deref())),
        FieldRow::new("Format", format_optional(config.default_format.as_deref())),
        FieldRow::new("Warning", t.warning),
        FieldRow::new("Critical", t.critical),
        FieldRow::new("Spike threshold", t.spike_threshold),
        FieldRow::new("Spike window (min)", t.spike_window_minutes),
        FieldRow::new("Cooldown (min)", t.cooldown_minutes),
        FieldRow::new("Recovery alerts", t.recovery_enabled),
        FieldRow::new("Alerting", t.alerting_enabled),
        FieldRow::new("Reading retention (days)", t.temperature_retention_days),
        FieldRow::new("Alert retention (days)", t.alert_retention_days),
    ];
    println!("{}", render_table(rows));
    Ok(())
}

/// Update the database path or default format
pub fn set_config(
    config: &mut Config,
    db_path: Option<PathBuf>,
    format: Option<OutputFormat>,
) -> Result<()> {
    if db_path.is_none() && format.is_none() {
        bail!("Nothing to set; pass --db-path or --default-format");
    }
    if let Some(path) = db_path {
        config.db_path = Some(path);
    }
    if let Some(format) = format {
        config.default_format = Some(format_name(format).to_string());
    }

    let path = config.save()?;
    print_success(&format!("Configuration saved to {}", path.display()));
    Ok(())
}

pub fn set_setting(config: &mut Config, category: &str, key: &str, raw: &str) -> Result<()> {
    let value = parse_setting_value(raw)?;
    if let SettingValue::Int(int) = value {
        if let Some(reason) = range_error(key, int) {
            bail!("{reason}");
        }
    }
    config.set_setting(category, key, value);

    let thresholds = Thresholds::load(&config.settings_provider());
    if thresholds.warning >= thresholds.critical {
        bail!(
            "Warning threshold ({}) must be below critical ({})",
            thresholds.warning,
            thresholds.critical
        );
    }

    config.save()?;
    print_success(&format!("{category}.{key} = {raw}"));
    Ok(())
}

pub fn unset_setting(config: &mut Config, category: &str, key: &str) -> Result<()> {
    if !config.unset_setting(category, key) {
        print_info(&format!("{category}.{key} was not set"));
        return Ok(());
    }
    config.save()?;
    print_success(&format!("{category}.{key} reset to default"));
    Ok(())
}

fn format_name(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Table => "table",
        OutputFormat::Json => "json",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn test_format_name_parses_back() {
        for format in [OutputFormat::Table, OutputFormat::Json] {
            assert_eq!(
                OutputFormat::from_str(format_name(format), true).unwrap(),
                format
            );
        }
    }
}
