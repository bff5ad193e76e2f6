//! # Keybridge Node
//!
//! Runs the API-key bridge: the merchant registry responder and one gateway
//! instance connected through the in-memory event bus.
//!
//! Configuration comes from the environment; see [`NodeConfig::from_env`].

use anyhow::{Context, Result};
use keybridge_telemetry::init_telemetry;
use node_runtime::{NodeConfig, NodeRuntime};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = NodeConfig::from_env().context("failed to load configuration")?;

    // Initialize logging, tracing and metrics
    let _telemetry = init_telemetry(config.telemetry.clone())
        .await
        .context("failed to initialize telemetry")?;

    // Create and start the node runtime
    let runtime = NodeRuntime::start(config)?;

    // Keep the node running
    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    // Graceful shutdown
    runtime.shutdown().await;

    Ok(())
}
