//! Run command: the interactive monitor

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use sw_core::config::{AppConfig, ConfigStore, TomlConfigStore};
use sw_core::error::ConfigError;
use sw_monitor::DefaultTransportFactory;
use sw_orchestrator::{command_channel, Collaborators, SessionOrchestrator};

use crate::console::{parse_target, read_commands, ConsoleUi};

/// Load the configuration at `path`, falling back to defaults when it does not exist
pub fn load_app_config(path: &Path) -> Result<AppConfig> {
    match TomlConfigStore::new(path).load() {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(_)) => {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(AppConfig::default())
        }
        Err(e) => {
            Err(e).with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
    }
}

/// Run the orchestrator with the console UI until the user quits or a signal arrives.
///
/// `server` overrides the configured target for this run without saving it.
pub async fn run_command(config_path: &Path, server: Option<&str>) -> Result<()> {
    let store = TomlConfigStore::new(config_path);
    let mut config = load_app_config(store.path())?;
    if let Some(spec) = server {
        config = config.with_target(parse_target(spec));
    }

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let ui = Arc::new(ConsoleUi::new(config.stale_after()));
    let (commands, command_rx) = command_channel();

    let reader = tokio::spawn(read_commands(
        BufReader::new(tokio::io::stdin()),
        commands,
        ui.clone(),
        config.ssh_config_path.clone(),
        shutdown.clone(),
    ));

    tracing::info!("Using configuration {}", store.location());
    let orchestrator = SessionOrchestrator::new(
        config,
        Collaborators {
            ui,
            factory: Arc::new(DefaultTransportFactory),
            store: Arc::new(store),
        },
        command_rx,
        shutdown.clone(),
    );

    let state = orchestrator.run().await;
    tracing::debug!("Orchestrator finished in state {}", state);

    shutdown.cancel();
    reader.await.context("Command reader failed")?;
    Ok(())
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, shutting down...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, shutting down...");
            }
            _ = shutdown.cancelled() => return,
        }

        shutdown.cancel();
    });
}
