//! The node runtime: bus, responder and gateway in one process.

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use api_gateway::{GatewayService, InMemoryCacheStore};
use merchant_registry::{InMemoryMerchantDirectory, LookupResponder};
use shared_bus::InMemoryEventBus;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Running node.
pub struct NodeRuntime {
    /// Shared event bus.
    bus: Arc<InMemoryEventBus>,
    /// Authoritative merchant data behind the responder.
    directory: Arc<InMemoryMerchantDirectory>,
    /// Gateway instance.
    gateway: GatewayService,
    /// Responder task.
    responder: JoinHandle<()>,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
}

impl NodeRuntime {
    /// Start every component. Must be called inside a Tokio runtime.
    pub fn start(config: NodeConfig) -> Result<Self> {
        info!("===========================================");
        info!("  Keybridge Node Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let bus = Arc::new(InMemoryEventBus::with_capacity(config.bus_capacity));

        let directory = Arc::new(InMemoryMerchantDirectory::seeded(config.seed_merchants));
        info!(merchants = directory.len(), "Merchant directory seeded");

        let gateway = GatewayService::start(
            config.bridge.clone(),
            Arc::clone(&bus),
            Arc::new(InMemoryCacheStore::new()),
        )
        .context("failed to start gateway bridge")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let responder = LookupResponder::new(
            directory.clone(),
            Arc::clone(&bus),
            &config.bridge.request_topic,
        );
        let responder = tokio::spawn(responder.run(shutdown_rx));

        info!(
            instance_id = %gateway.config().instance_id,
            "Node runtime started"
        );

        Ok(Self {
            bus,
            directory,
            gateway,
            responder,
            shutdown_tx,
        })
    }

    pub fn gateway(&self) -> &GatewayService {
        &self.gateway
    }

    pub fn directory(&self) -> Arc<InMemoryMerchantDirectory> {
        Arc::clone(&self.directory)
    }

    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        Arc::clone(&self.bus)
    }

    /// Stop the gateway, then the responder, then close the bus.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");

        self.gateway.shutdown().await;

        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.responder.await {
            error!(error = %e, "Responder task failed");
        }

        self.bus.close();
        info!("Node runtime stopped");
    }
}
