//! Thermwatch CLI
//!
//! A command-line tool for inspecting drive temperature statistics,
//! managing alerts and spikes, and maintaining the thermwatch database.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{alerts, maintenance, spikes, stats, ReadingArgs, Session};
use std::path::PathBuf;
use std::sync::Arc;
use thermal_engine::{settings::SettingsProvider, stats::Period};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Thermwatch CLI
#[derive(Parser)]
#[command(name = "twctl")]
#[command(author, version, about = "CLI for thermwatch drive temperature monitoring", long_about = None)]
pub struct Cli {
    /// SQLite database (can also be set via TWCTL_DB env var)
    #[arg(long, env = "TWCTL_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Output format (defaults to the configured format, else table)
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show statistics for one drive
    Stats(stats::DriveArgs),

    /// Show chart points for one drive
    Series(stats::DriveArgs),

    /// Show the latest temperature of every drive
    Current {
        /// Filter by host
        #[arg(long)]
        hostname: Option<String>,
    },

    /// Show the fleet overview
    Summary,

    /// Show how current temperatures are distributed
    Distribution,

    /// Show per-drive temperature trends
    Trends {
        #[arg(long, short, default_value = "24h")]
        period: Period,
    },

    /// Manage alerts
    #[command(subcommand)]
    Alerts(AlertCommands),

    /// Manage temperature spikes
    #[command(subcommand)]
    Spikes(SpikeCommands),

    /// Record a temperature reading and evaluate it
    Ingest(ReadingArgs),

    /// Delete readings, spikes and alerts past their retention period
    Cleanup,

    /// View and edit CLI configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum AlertCommands {
    /// List alerts, newest first
    List(alerts::ListArgs),

    /// Acknowledge an alert
    Ack {
        /// Alert ID
        id: i64,
        /// Who is acknowledging
        #[arg(long, default_value = "cli-user")]
        by: String,
    },

    /// Delete an alert
    Delete { id: i64 },

    /// Show alert counts
    Summary,

    /// Evaluate a temperature without recording a reading
    Test(ReadingArgs),
}

#[derive(Subcommand)]
pub enum SpikeCommands {
    /// List spikes, newest first
    List(spikes::ListArgs),

    /// Acknowledge a spike
    Ack { id: i64 },

    /// Delete a spike
    Delete { id: i64 },

    /// Scan stored readings for new spikes
    Detect(spikes::DetectArgs),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration and effective thresholds
    Show,

    /// Set the default database or output format
    Set {
        #[arg(long)]
        db_path: Option<PathBuf>,
        #[arg(long)]
        default_format: Option<output::OutputFormat>,
    },

    /// Set a threshold setting, e.g. `temperature warning_threshold 50`
    SetSetting {
        category: String,
        key: String,
        value: String,
    },

    /// Remove a threshold setting so its default applies
    UnsetSetting { category: String, key: String },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load()?;
    let format = config.resolve_format(cli.format);
    let db_path = config.resolve_db_path(cli.db);
    let settings: Arc<dyn SettingsProvider> = Arc::new(config.settings_provider());

    // Configuration commands never open the database
    let session = || Session::open(&db_path, Arc::clone(&settings), format);

    match cli.command {
        Commands::Stats(drive) => stats::show_stats(&session()?, &drive)?,
        Commands::Series(drive) => stats::show_series(&session()?, &drive)?,
        Commands::Current { hostname } => stats::show_current(&session()?, hostname.as_deref())?,
        Commands::Summary => stats::show_summary(&session()?)?,
        Commands::Distribution => stats::show_distribution(&session()?)?,
        Commands::Trends { period } => stats::show_trends(&session()?, period)?,
        Commands::Alerts(alert_cmd) => {
            let session = session()?;
            match alert_cmd {
                AlertCommands::List(args) => alerts::list(&session, args)?,
                AlertCommands::Ack { id, by } => alerts::acknowledge(&session, id, &by)?,
                AlertCommands::Delete { id } => alerts::delete(&session, id)?,
                AlertCommands::Summary => alerts::summary(&session)?,
                AlertCommands::Test(reading) => alerts::test(&session, &reading)?,
            }
        }
        Commands::Spikes(spike_cmd) => {
            let session = session()?;
            match spike_cmd {
                SpikeCommands::List(args) => spikes::list(&session, args)?,
                SpikeCommands::Ack { id } => spikes::acknowledge(&session, id)?,
                SpikeCommands::Delete { id } => spikes::delete(&session, id)?,
                SpikeCommands::Detect(args) => spikes::detect(&session, args)?,
            }
        }
        Commands::Ingest(reading) => maintenance::ingest(&session()?, &reading)?,
        Commands::Cleanup => maintenance::cleanup(&session()?)?,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => maintenance::show_config(&config, format)?,
            ConfigCommands::Set {
                db_path,
                default_format,
            } => maintenance::set_config(&mut config, db_path, default_format)?,
            ConfigCommands::SetSetting {
                category,
                key,
                value,
            } => maintenance::set_setting(&mut config, &category, &key, &value)?,
            ConfigCommands::UnsetSetting { category, key } => {
                maintenance::unset_setting(&mut config, &category, &key)?
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use thermal_engine::AlertType;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_alert_filters() {
        let cli = Cli::try_parse_from([
            "twctl", "alerts", "list", "--type", "critical", "--since", "7d", "--unacknowledged",
        ])
        .unwrap();
        match cli.command {
            Commands::Alerts(AlertCommands::List(args)) => {
                assert_eq!(args.alert_type, Some(AlertType::Critical));
                assert_eq!(args.since, Some(Period::Week));
                assert!(args.unacknowledged);
            }
            _ => panic!("expected alerts list"),
        }
    }

    #[test]
    fn test_rejects_unknown_period() {
        assert!(Cli::try_parse_from(["twctl", "trends", "--period", "2w"]).is_err());
    }

    #[test]
    fn test_negative_temperature_is_accepted() {
        let cli = Cli::try_parse_from(["twctl", "ingest", "nas01", "SN1", "-5"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ingest(ReadingArgs { temperature: -5, .. })
        ));
    }
}
