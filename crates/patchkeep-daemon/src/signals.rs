//! Signal handling for graceful shutdown.

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

/// Wait until SIGTERM or SIGINT arrives. Returns the signal name.
pub async fn wait_for_shutdown() -> Result<&'static str> {
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    let name = tokio::select! {
        _ = terminate.recv() => "SIGTERM",
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for SIGINT")?;
            "SIGINT"
        }
    };

    info!(signal = name, "Received shutdown signal");
    Ok(name)
}
