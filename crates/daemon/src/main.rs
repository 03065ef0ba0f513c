//! thermwatch - drive temperature monitoring daemon
//!
//! Accepts temperature readings, raises threshold and spike alerts, and
//! keeps the database within its retention limits.

use anyhow::{Context, Result};
use std::sync::Arc;
use thermal_engine::{
    settings::SettingsProvider, AlertEngine, HealthRegistry, Processor, SpikeDetector, Store,
    StructuredLogger,
};
use thermwatch_daemon::{api, config::DaemonConfig};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DAEMON_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting thermwatch");

    let config = DaemonConfig::load()?;
    info!(
        instance = %config.instance_name,
        db_path = %config.db_path.display(),
        api_port = config.api_port,
        "Daemon configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let store = Store::open(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;

    let logger = StructuredLogger::new(&config.instance_name);
    let settings: Arc<dyn SettingsProvider> = Arc::new(config.settings());
    let engine = Arc::new(
        AlertEngine::new(store.clone(), Arc::clone(&settings)).with_logger(logger.clone()),
    );
    let detector = SpikeDetector::new(store).with_logger(logger.clone());

    let processor = Arc::new(
        Processor::new(
            engine,
            detector,
            health_registry.clone(),
            config.processor_config(),
        )
        .with_logger(logger.clone()),
    );
    processor.start()?;
    logger.log_startup(DAEMON_VERSION, &config.db_path.display().to_string());

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        Arc::clone(&processor),
    ));
    health_registry.set_ready(true).await;

    api::serve(config.api_port, app_state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;
    processor.shutdown().await?;
    info!("Shutdown complete");

    Ok(())
}
