//! Test fixtures: a bus with a gateway instance, the real responder, and a
//! scripted responder for timing-sensitive scenarios.

use api_gateway::{
    ApiKeyResolver, ApiKeyValidator, BridgeConfig, BridgeError, GatewayService,
    InMemoryCacheStore,
};
use async_trait::async_trait;
use bytes::Bytes;
use merchant_registry::{InMemoryMerchantDirectory, LookupResponder};
use shared_bus::{EventFilter, EventPublisher, InMemoryEventBus};
use shared_types::{ApiKey, LookupReply, LookupRequest, MerchantId, LOOKUP_REQUEST_TOPIC};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub fn key(raw: &str) -> ApiKey {
    ApiKey::parse(raw).expect("test key")
}

pub fn merchant(raw: i64) -> MerchantId {
    MerchantId::new(raw).expect("test merchant id")
}

/// Bridge config for a named instance with the given deadline.
pub fn bridge_config(instance_id: &str, timeout: Duration) -> BridgeConfig {
    let timeout_ms = timeout.as_millis() as u64;
    BridgeConfig {
        instance_id: instance_id.to_string(),
        default_timeout_ms: timeout_ms,
        sweep_grace_ms: timeout_ms,
        ..Default::default()
    }
}

/// Validator decorator counting calls that reach the bridge.
pub struct CountingValidator {
    inner: Arc<dyn ApiKeyValidator>,
    calls: AtomicUsize,
}

impl CountingValidator {
    pub fn new(inner: Arc<dyn ApiKeyValidator>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApiKeyValidator for CountingValidator {
    async fn validate(&self, api_key: &ApiKey) -> Result<Option<MerchantId>, BridgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.validate(api_key).await
    }
}

/// One gateway instance, the merchant registry responder and a shared bus.
pub struct Harness {
    pub bus: Arc<InMemoryEventBus>,
    pub directory: Arc<InMemoryMerchantDirectory>,
    pub gateway: GatewayService,
    pub cache: Arc<InMemoryCacheStore>,
    pub validator: Arc<CountingValidator>,
    pub resolver: ApiKeyResolver,
    responder: Option<(watch::Sender<bool>, JoinHandle<()>)>,
}

impl Harness {
    /// Harness with the real responder serving `seed`.
    pub fn start(seed: &[(&str, i64)], timeout: Duration) -> Self {
        let mut harness = Self::without_responder(timeout);
        for (raw, id) in seed {
            harness.directory.insert(
                &key(raw),
                shared_types::MerchantRecord::active(merchant(*id), format!("merchant-{id}")),
            );
        }
        harness.start_responder();
        harness
    }

    /// Harness where nothing answers lookup requests.
    pub fn without_responder(timeout: Duration) -> Self {
        let bus = Arc::new(InMemoryEventBus::new());
        let cache = Arc::new(InMemoryCacheStore::new());
        let gateway = GatewayService::start(
            bridge_config("gw-test", timeout),
            Arc::clone(&bus),
            cache.clone(),
        )
        .expect("valid bridge config");

        let validator = Arc::new(CountingValidator::new(gateway.client()));
        let resolver = ApiKeyResolver::new(cache.clone(), validator.clone());

        Self {
            bus,
            directory: Arc::new(InMemoryMerchantDirectory::new()),
            gateway,
            cache,
            validator,
            resolver,
            responder: None,
        }
    }

    /// Start (or restart) the real responder.
    pub fn start_responder(&mut self) {
        if self.responder.is_some() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        let responder = LookupResponder::new(
            self.directory.clone(),
            Arc::clone(&self.bus),
            LOOKUP_REQUEST_TOPIC,
        );
        self.responder = Some((tx, tokio::spawn(responder.run(rx))));
    }

    /// Stop the responder and wait for it to release its subscription.
    pub async fn stop_responder(&mut self) {
        if let Some((tx, handle)) = self.responder.take() {
            let _ = tx.send(true);
            let _ = handle.await;
        }
    }

    pub async fn shutdown(mut self) {
        self.stop_responder().await;
        self.gateway.shutdown().await;
    }
}

/// How the scripted responder answers one key.
#[derive(Debug, Clone, Copy)]
pub struct Script {
    pub merchant: Option<i64>,
    pub delay: Duration,
    /// Times the reply is published (redelivery).
    pub copies: usize,
}

impl Script {
    pub fn found(merchant: i64) -> Self {
        Self {
            merchant: Some(merchant),
            delay: Duration::ZERO,
            copies: 1,
        }
    }

    pub fn not_found() -> Self {
        Self {
            merchant: None,
            delay: Duration::ZERO,
            copies: 1,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn copies(mut self, copies: usize) -> Self {
        self.copies = copies;
        self
    }
}

/// Responder that answers each request on its own task, following `script`.
/// Keys without a script are never answered.
pub fn spawn_scripted_responder(
    bus: Arc<InMemoryEventBus>,
    script: HashMap<String, Script>,
) -> JoinHandle<()> {
    let mut requests = bus.subscribe(EventFilter::topic(LOOKUP_REQUEST_TOPIC));
    let script = Arc::new(script);

    tokio::spawn(async move {
        while let Some(message) = requests.recv().await {
            let Ok(request) = LookupRequest::from_slice(&message.payload) else {
                continue;
            };
            let Some(entry) = script.get(&request.api_key).copied() else {
                continue;
            };

            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                if !entry.delay.is_zero() {
                    tokio::time::sleep(entry.delay).await;
                }
                let reply = match entry.merchant.and_then(MerchantId::new) {
                    Some(id) => LookupReply::found(request.correlation_id.as_str(), id),
                    None => LookupReply::not_found(request.correlation_id.as_str()),
                };
                let payload = Bytes::from(reply.to_bytes().expect("encode reply"));
                for _ in 0..entry.copies {
                    let _ = bus.publish(&request.reply_to, payload.clone()).await;
                }
            });
        }
    })
}
