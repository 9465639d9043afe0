use crate::config::{load_config, Config, ConfigError};
use crate::connection::ConnectionManager;
use crate::pipeline::{MonitoringScheduler, UploadPipeline};
use crate::settings::{JsonFileSettings, SettingsError, SettingsStore};
use crate::source::{DirectoryScanner, LivenessCheck, LogExtractor};
use crate::transport::{CollectorError, HttpCollector};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("collector client error: {0}")]
    Collector(#[from] CollectorError),

    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

pub async fn run(config_path: Option<PathBuf>, server: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(path).map_err(RunError::from)?
        }
        None => {
            info!("No config file found, using defaults");
            Config::default()
        }
    };

    run_agent(config, server).await.map_err(|e| e.into())
}

/// Run the agent until Ctrl+C.
pub async fn run_agent(config: Config, server: Option<String>) -> Result<(), RunError> {
    let settings_path = config.settings_path();
    info!(path = %settings_path.display(), "Opening settings");
    let settings: Arc<dyn SettingsStore> =
        Arc::new(JsonFileSettings::new(settings_path, config.product_directories()));

    if let Some(address) = server {
        let stored = settings.set_server_address(&address).await?;
        info!(address = %stored, "Server address overridden from command line");
    }

    let installed = settings.installed_products().await?;
    if installed.is_empty() {
        info!("No products installed yet, passes will find nothing to ship");
    } else {
        info!(products = ?installed, "Found installed products");
    }

    let collector = Arc::new(HttpCollector::new(
        Arc::clone(&settings),
        config.connection.request_timeout,
        config.connection.health_timeout,
    )?);

    let pipeline = UploadPipeline::new(
        Arc::clone(&settings),
        collector.clone(),
        DirectoryScanner::new(&config.monitor.file_marker, &config.monitor.file_extension),
        LogExtractor::default(),
        LivenessCheck::default(),
    );
    let scheduler = Arc::new(MonitoringScheduler::new(Arc::new(pipeline), config.monitor.interval));
    let manager = Arc::new(ConnectionManager::new(
        settings,
        collector,
        Arc::clone(&scheduler),
        config.connection.timings(),
    ));

    // Headless: nobody watches a window, so failed connections retry on their own.
    manager.set_window_visible(false);

    let cancel = CancellationToken::new();
    let background = manager.spawn_background_tasks(cancel.clone());

    let mut states = manager.subscribe();
    let state_logger = tokio::spawn({
        let manager = Arc::clone(&manager);
        let cancel = cancel.clone();
        async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let status = manager.status();
                        info!(state = %status.state, detail = status.detail, update = ?status.update, "Status");
                    }
                }
            }
        }
    });

    info!("Agent started, press Ctrl+C to shutdown");

    let signal_result = tokio::select! {
        result = signal::ctrl_c() => result,
        _ = async {
            manager.connect().await;
            std::future::pending::<()>().await
        } => Ok(()),
    };
    match &signal_result {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }

    cancel.cancel();
    background.join().await;
    if let Err(e) = state_logger.await {
        error!(error = %e, "Status logger join error");
    }

    manager.disconnect().await;
    scheduler.shutdown().await;
    signal_result.map_err(RunError::Signal)?;

    info!("Agent shutdown complete");
    Ok(())
}
