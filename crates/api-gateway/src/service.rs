//! Gateway service - owns one instance's bridge and its background tasks.

use crate::domain::config::BridgeConfig;
use crate::domain::error::ConfigError;
use crate::domain::pending::{sweep_task, PendingCallRegistry};
use crate::ipc::handler::BridgeClient;
use crate::ipc::listener::ReplyListener;
use crate::ipc::publisher::BusRequestPublisher;
use crate::ports::outbound::CacheStore;
use crate::resolver::ApiKeyResolver;
use shared_bus::{EventFilter, InMemoryEventBus};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// One gateway instance: registry, reply listener, sweeper, bridge client and
/// cache-aside resolver.
///
/// Constructed once per instance and torn down with [`shutdown`](Self::shutdown).
pub struct GatewayService {
    config: BridgeConfig,
    registry: Arc<PendingCallRegistry>,
    client: Arc<BridgeClient>,
    resolver: Arc<ApiKeyResolver>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl GatewayService {
    /// Validate `config`, subscribe to the private reply topic and spawn the
    /// reply listener and sweeper. Must be called inside a Tokio runtime.
    pub fn start(
        config: BridgeConfig,
        bus: Arc<InMemoryEventBus>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let reply_topic = config.reply_topic();
        let registry = Arc::new(PendingCallRegistry::new());

        // Subscribe before the first request can be published
        let subscription = bus.subscribe(EventFilter::topic(reply_topic.clone()));

        let publisher = Arc::new(BusRequestPublisher::new(bus, config.request_topic.clone()));
        let client = Arc::new(BridgeClient::new(
            Arc::clone(&registry),
            publisher,
            reply_topic.clone(),
            config.default_timeout(),
        ));
        let resolver = Arc::new(ApiKeyResolver::with_ttl(
            cache,
            client.clone(),
            config.cache_ttl(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener = ReplyListener::new(Arc::clone(&registry), subscription);
        let tasks = vec![
            tokio::spawn(listener.run(shutdown_rx.clone())),
            tokio::spawn(sweep_task(
                Arc::clone(&registry),
                config.sweep_grace(),
                config.sweep_interval(),
                shutdown_rx,
            )),
        ];

        info!(
            instance_id = %config.instance_id,
            reply_topic = %reply_topic,
            request_topic = %config.request_topic,
            timeout_ms = config.default_timeout_ms,
            "Gateway bridge started"
        );

        Ok(Self {
            config,
            registry,
            client,
            resolver,
            shutdown_tx,
            tasks,
        })
    }

    /// Cache-aside entry point used by the HTTP edge.
    pub fn resolver(&self) -> Arc<ApiKeyResolver> {
        Arc::clone(&self.resolver)
    }

    /// Uncached bridge client.
    pub fn client(&self) -> Arc<BridgeClient> {
        Arc::clone(&self.client)
    }

    pub fn registry(&self) -> Arc<PendingCallRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Stop the reply listener and sweeper and wait for them. Calls still in
    /// flight time out normally.
    pub async fn shutdown(self) {
        info!(instance_id = %self.config.instance_id, "Shutting down gateway bridge");
        let _ = self.shutdown_tx.send(true);

        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Gateway task failed");
            }
        }

        info!("Gateway bridge stopped");
    }
}
