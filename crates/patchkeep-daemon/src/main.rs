//! Patchkeep Daemon - keeps audio and MIDI connection managers running.
//!
//! Starts one connection manager per enabled backend over PipeWire, logs
//! every change event they raise, and disposes them on SIGINT/SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use patchkeep_core::{ChangeType, Connectable, ConnectionEvent, ConnectionType, Severity};
use patchkeep_manager::ConnectionManager;
use patchkeep_pipewire::PipeWireBackend;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod signals;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;

    // Initialize logging
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.daemon.log_level)
            .with_context(|| format!("Invalid log level: {}", config.daemon.log_level))?
            .add_directive("patchkeep_pipewire=info".parse()?),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Patchkeep daemon");
    debug!(?config, "Configuration loaded");

    let managers = start_managers(&config)?;
    if managers.is_empty() {
        warn!("No backends enabled, nothing to do");
        return Ok(());
    }

    info!(count = managers.len(), "Daemon running. Press Ctrl+C to exit.");
    let signal = signals::wait_for_shutdown().await?;

    info!(signal, "Shutting down");
    for manager in &managers {
        manager.dispose();
    }

    info!("Patchkeep daemon stopped");
    Ok(())
}

/// Start a connection manager for each enabled backend.
fn start_managers(config: &Config) -> Result<Vec<ConnectionManager>> {
    let enabled = [
        (ConnectionType::Audio, config.backends.audio),
        (ConnectionType::Midi, config.backends.midi),
    ];

    let mut managers = Vec::new();
    for (connection_type, _) in enabled.into_iter().filter(|(_, on)| *on) {
        let backend = Arc::new(PipeWireBackend::new(connection_type));
        let manager = ConnectionManager::start(backend, config.manager_config())
            .with_context(|| format!("Failed to start {connection_type} connection manager"))?;

        if !manager.is_active() {
            warn!(%connection_type, "PipeWire not reachable yet, will keep retrying");
        }
        if let Some(clients) = manager.clients() {
            info!(%connection_type, clients = clients.len(), "Initial graph loaded");
        }

        tokio::spawn(log_events(connection_type, manager.subscribe()));
        managers.push(manager);
    }

    Ok(managers)
}

/// Log every change event until the manager is disposed.
async fn log_events(connection_type: ConnectionType, mut events: mpsc::UnboundedReceiver<ConnectionEvent>) {
    while let Some(event) = events.recv().await {
        let labels: Vec<String> = event.connectables.iter().map(Connectable::label).collect();
        let connections: Vec<String> = event.connections.iter().map(ToString::to_string).collect();
        let message = event.message.as_deref().unwrap_or_default();

        match (event.change, event.severity) {
            (_, Severity::Error) => error!(%connection_type, detail = message, "Manager error"),
            (_, Severity::Warning) => warn!(%connection_type, change = ?event.change, detail = message, "Manager warning"),
            (ChangeType::New | ChangeType::Removed, _) => info!(
                %connection_type,
                change = ?event.change,
                ports = ?labels,
                ?connections,
                "Graph changed"
            ),
            _ => info!(%connection_type, change = ?event.change, detail = message, "Manager status"),
        }

        match serde_json::to_string(&event) {
            Ok(json) => debug!(%connection_type, event = %json, "Event payload"),
            Err(e) => warn!(error = %e, "Failed to serialize event"),
        }
    }
    debug!(%connection_type, "Event stream closed");
}
