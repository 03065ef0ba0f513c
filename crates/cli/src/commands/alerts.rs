//! Alert listing and lifecycle commands

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tabled::Tabled;
use thermal_engine::{stats::Period, Alert, AlertFilter, AlertType};

use super::{ReadingArgs, Session};
use crate::output::{
    color_alert_type, format_bool, format_optional, format_temp, format_time, print_info,
    print_json, print_list, print_success, render_table, FieldRow, OutputFormat,
};

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Type")]
    alert_type: String,
    #[tabled(rename = "Host")]
    hostname: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Ack")]
    acknowledged: String,
    #[tabled(rename = "Created")]
    created_at: String,
}

impl From<&Alert> for AlertRow {
    fn from(alert: &Alert) -> Self {
        Self {
            id: alert.id,
            alert_type: color_alert_type(alert.alert_type),
            hostname: alert.hostname.clone(),
            serial: alert.serial.clone(),
            temperature: format_temp(alert.temperature),
            message: alert.message.clone(),
            acknowledged: format_bool(alert.acknowledged),
            created_at: format_time(alert.created_at),
        }
    }
}

/// Filters accepted by `alerts list`
#[derive(Debug, Default, Args)]
pub struct ListArgs {
    #[arg(long)]
    pub hostname: Option<String>,
    #[arg(long)]
    pub serial: Option<String>,
    /// Filter by type (warning, critical, spike, recovery)
    #[arg(long = "type")]
    pub alert_type: Option<AlertType>,
    /// Only alerts that have not been acknowledged
    #[arg(long)]
    pub unacknowledged: bool,
    /// Only alerts raised within this period
    #[arg(long)]
    pub since: Option<Period>,
    #[arg(long, short)]
    pub limit: Option<usize>,
}

impl ListArgs {
    fn filter(self) -> AlertFilter {
        AlertFilter {
            hostname: self.hostname,
            serial: self.serial,
            alert_type: self.alert_type,
            acknowledged: self.unacknowledged.then_some(false),
            since: self.since.and_then(|p| p.since(Utc::now())),
            limit: self.limit,
        }
    }
}

pub fn list(session: &Session, args: ListArgs) -> Result<()> {
    let alerts = session.alert_engine().get_alerts(&args.filter())?;
    let rows: Vec<AlertRow> = alerts.iter().map(AlertRow::from).collect();
    print_list(&alerts, rows, "alerts", session.format)
}

pub fn acknowledge(session: &Session, id: i64, acknowledged_by: &str) -> Result<()> {
    let alert = session
        .alert_engine()
        .acknowledge_alert(id, acknowledged_by)
        .with_context(|| format!("Failed to acknowledge alert {id}"))?;

    match session.format {
        OutputFormat::Json => print_json(&alert),
        OutputFormat::Table => {
            let by = format_optional(alert.acknowledged_by.as_deref());
            print_success(&format!("Alert {id} acknowledged by {by}"));
            Ok(())
        }
    }
}

pub fn delete(session: &Session, id: i64) -> Result<()> {
    session
        .alert_engine()
        .delete_alert(id)
        .with_context(|| format!("Failed to delete alert {id}"))?;
    print_success(&format!("Alert {id} deleted"));
    Ok(())
}

/// Counts by type plus the unacknowledged total
pub fn summary(session: &Session) -> Result<()> {
    let summary = session.alert_engine().get_alert_summary()?;

    if session.format == OutputFormat::Json {
        return print_json(&summary);
    }

    let rows = vec![
        FieldRow::new("Total", summary.total),
        FieldRow::new("Unacknowledged", summary.unacknowledged),
        FieldRow::new("Warning", summary.warning),
        FieldRow::new("Critical", summary.critical),
        FieldRow::new("Spike", summary.spike),
        FieldRow::new("Recovery", summary.recovery),
    ];
    println!("{}", render_table(rows));
    Ok(())
}

/// Run a temperature through the alert rules without recording a reading
pub fn test(session: &Session, reading: &ReadingArgs) -> Result<()> {
    let ReadingArgs {
        hostname,
        serial,
        temperature,
    } = reading;
    let alert = session
        .alert_engine()
        .test_alert(hostname, serial, *temperature)?;

    match (session.format, alert) {
        (OutputFormat::Json, alert) => print_json(&alert),
        (OutputFormat::Table, Some(alert)) => {
            println!("{}", render_table(vec![AlertRow::from(&alert)]));
            Ok(())
        }
        (OutputFormat::Table, None) => {
            print_info(&format!(
                "No alert for {hostname}/{serial} at {}",
                format_temp(*temperature)
            ));
            Ok(())
        }
    }
}
