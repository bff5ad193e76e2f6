//! Bridge Client: the synchronous-looking `validate` entry point.

use crate::domain::correlation::CorrelationId;
use crate::domain::error::BridgeError;
use crate::domain::pending::{CallState, PendingCallRegistry};
use crate::ports::outbound::{ApiKeyValidator, RequestPublisher};
use async_trait::async_trait;
use keybridge_telemetry::{HistogramTimer, BRIDGE_CALLS, BRIDGE_LATENCY};
use shared_types::{ApiKey, LookupRequest, MerchantId};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Turns one request/reply exchange over the bus into a bounded call.
pub struct BridgeClient {
    /// Pending calls shared with the reply listener
    registry: Arc<PendingCallRegistry>,
    /// Outgoing request channel
    publisher: Arc<dyn RequestPublisher>,
    /// This instance's private reply topic
    reply_to: String,
    /// Deadline when the caller gives none
    default_timeout: Duration,
}

impl BridgeClient {
    pub fn new(
        registry: Arc<PendingCallRegistry>,
        publisher: Arc<dyn RequestPublisher>,
        reply_to: impl Into<String>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            publisher,
            reply_to: reply_to.into(),
            default_timeout,
        }
    }

    /// Resolve `api_key` with the default deadline.
    ///
    /// `Ok(None)` is a confirmed "not found". Every error means the key's
    /// status is unknown.
    pub async fn validate(&self, api_key: &ApiKey) -> Result<Option<MerchantId>, BridgeError> {
        self.validate_with_timeout(api_key, None).await
    }

    /// Resolve `api_key`, waiting at most `timeout` (default deadline if `None`).
    ///
    /// The registry entry created for the call is removed on every exit path,
    /// including the caller dropping this future.
    #[instrument(skip_all, fields(api_key = %api_key))]
    pub async fn validate_with_timeout(
        &self,
        api_key: &ApiKey,
        timeout: Option<Duration>,
    ) -> Result<Option<MerchantId>, BridgeError> {
        let deadline = timeout.unwrap_or(self.default_timeout);
        let result = self.call(api_key, deadline).await;

        let outcome = match &result {
            Ok(Some(_)) => "found",
            Ok(None) => "not_found",
            Err(e) => e.outcome(),
        };
        BRIDGE_CALLS.with_label_values(&[outcome]).inc();

        result
    }

    async fn call(
        &self,
        api_key: &ApiKey,
        deadline: Duration,
    ) -> Result<Option<MerchantId>, BridgeError> {
        let correlation_id = CorrelationId::new();
        let mut rx = self.registry.register(correlation_id, deadline)?;
        let mut guard = CallGuard::new(&self.registry, correlation_id);

        let request = LookupRequest::new(correlation_id.to_string(), api_key, self.reply_to.as_str());
        if let Err(e) = self.publisher.publish(&request).await {
            guard.finish(CallState::PublishFailed);
            self.registry
                .stats()
                .publish_failed
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                correlation_id = %correlation_id,
                error = %e,
                "Lookup request could not be published"
            );
            return Err(e);
        }

        debug!(
            correlation_id = %correlation_id,
            deadline_ms = deadline.as_millis() as u64,
            "Waiting for lookup reply"
        );

        let _timer = HistogramTimer::new(&BRIDGE_LATENCY);
        match tokio::time::timeout(deadline, &mut rx).await {
            Ok(Ok(reply)) => {
                guard.settled();
                Ok(reply.identity())
            }
            Ok(Err(_)) => {
                // Sender dropped without a reply: the entry was swept
                guard.finish(CallState::TimedOut);
                Err(BridgeError::Abandoned)
            }
            Err(_) => {
                if guard.finish(CallState::TimedOut) {
                    self.registry
                        .stats()
                        .timed_out
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(
                        correlation_id = %correlation_id,
                        deadline_ms = deadline.as_millis() as u64,
                        "Lookup timed out"
                    );
                    return Err(BridgeError::TimedOut { after: deadline });
                }

                // Entry already claimed by a reply as the deadline fired. Its
                // sender is sent on or dropped right after the claim.
                match (&mut rx).await {
                    Ok(reply) => {
                        debug!(
                            correlation_id = %correlation_id,
                            "Reply settled at the deadline"
                        );
                        Ok(reply.identity())
                    }
                    Err(_) => Err(BridgeError::Abandoned),
                }
            }
        }
    }

    /// Pending calls of this client's registry
    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    /// Reply topic stamped on every request
    pub fn reply_to(&self) -> &str {
        &self.reply_to
    }
}

#[async_trait]
impl ApiKeyValidator for BridgeClient {
    async fn validate(&self, api_key: &ApiKey) -> Result<Option<MerchantId>, BridgeError> {
        BridgeClient::validate(self, api_key).await
    }
}

/// Removes the registry entry if the call is dropped while still `Registered`.
struct CallGuard<'a> {
    registry: &'a PendingCallRegistry,
    correlation_id: CorrelationId,
    state: CallState,
}

impl<'a> CallGuard<'a> {
    fn new(registry: &'a PendingCallRegistry, correlation_id: CorrelationId) -> Self {
        Self {
            registry,
            correlation_id,
            state: CallState::Registered,
        }
    }

    /// The reply listener already removed the entry.
    fn settled(&mut self) {
        self.state = CallState::Settled;
    }

    /// Leave `Registered` by removing the entry ourselves. False if it was
    /// already gone.
    fn finish(&mut self, state: CallState) -> bool {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.registry.cancel(&self.correlation_id)
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if self.state == CallState::Registered && self.registry.cancel(&self.correlation_id) {
            BRIDGE_CALLS.with_label_values(&["cancelled"]).inc();
            debug!(
                correlation_id = %self.correlation_id,
                "Caller dropped an in-flight lookup"
            );
        }
    }
}
