//! Output formatting utilities

use chrono::{DateTime, Local, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use thermal_engine::{stats::TrendDirection, AlertType, DriveStatus, SpikeDirection};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Key/value row for single-record views
#[derive(Tabled)]
pub struct FieldRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl FieldRow {
    pub fn new(field: &str, value: impl ToString) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn render_table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print `data` as JSON, or `rows` as a table with an item count
pub fn print_list<T, R>(data: &[T], rows: Vec<R>, noun: &str, format: OutputFormat) -> anyhow::Result<()>
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Json => print_json(data),
        OutputFormat::Table => {
            if rows.is_empty() {
                print_warning(&format!("No {noun} found"));
                return Ok(());
            }
            println!("{}", render_table(rows));
            println!("\nTotal: {} {}", data.len(), noun);
            Ok(())
        }
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Timestamp in the operator's local time zone
pub fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_temp(temperature: i64) -> String {
    format!("{temperature}°C")
}

pub fn format_optional(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

pub fn format_bool(value: bool) -> String {
    if value {
        "yes".green().to_string()
    } else {
        "no".dimmed().to_string()
    }
}

pub fn color_status(status: DriveStatus) -> String {
    let text = status.to_string();
    match status {
        DriveStatus::Normal => text.green().to_string(),
        DriveStatus::Warning => text.yellow().to_string(),
        DriveStatus::Critical => text.red().bold().to_string(),
    }
}

pub fn color_alert_type(alert_type: AlertType) -> String {
    let text = alert_type.to_string();
    match alert_type {
        AlertType::Warning => text.yellow().to_string(),
        AlertType::Critical => text.red().bold().to_string(),
        AlertType::Spike => text.magenta().to_string(),
        AlertType::Recovery => text.green().to_string(),
    }
}

pub fn color_direction(direction: SpikeDirection) -> String {
    let text = direction.to_string();
    match direction {
        SpikeDirection::Heating => text.red().to_string(),
        SpikeDirection::Cooling => text.blue().to_string(),
    }
}

pub fn color_trend(trend: TrendDirection) -> String {
    let text = trend.to_string();
    match trend {
        TrendDirection::Heating => text.red().to_string(),
        TrendDirection::Cooling => text.blue().to_string(),
        TrendDirection::Stable => text.green().to_string(),
        TrendDirection::InsufficientData => text.dimmed().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_temp(47), "47°C");
        assert_eq!(format_optional(None), "-");
        assert_eq!(format_optional(Some("sda")), "sda");
    }

    #[test]
    fn test_render_table_contains_cells() {
        let table = render_table(vec![FieldRow::new("Warning", 45)]);
        assert!(table.contains("Field"));
        assert!(table.contains("Warning"));
        assert!(table.contains("45"));
    }
}
