//! # Lookup Responder
//!
//! Listens for lookup requests on the shared request topic and publishes a
//! reply carrying the same correlation ID to the requester's reply topic.
//!
//! Requests are handled one at a time, in arrival order.

use crate::ports::outbound::MerchantDirectory;
use bytes::Bytes;
use keybridge_telemetry::{BUS_MESSAGES_PUBLISHED, MALFORMED_MESSAGES, RESPONDER_LOOKUPS};
use shared_bus::{BusMessage, EventFilter, EventPublisher, InMemoryEventBus, Subscription};
use shared_types::{LookupReply, LookupRequest};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderOutcome {
    /// Answered `valid = true`
    Found,
    /// Answered `valid = false` (unknown key, suspended merchant or lookup error)
    NotFound,
    /// Not decodable or not answerable; nothing was published
    Dropped,
    /// A reply was built but could not be published
    ReplyFailed,
}

/// Answers lookup requests from the merchant directory.
pub struct LookupResponder {
    /// Authoritative merchant data
    directory: Arc<dyn MerchantDirectory>,
    /// Bus used for replies
    publisher: Arc<dyn EventPublisher>,
    /// Subscription to the request topic
    subscription: Subscription,
}

impl LookupResponder {
    /// Create a responder subscribed to `request_topic` on `bus`.
    pub fn new(
        directory: Arc<dyn MerchantDirectory>,
        bus: Arc<InMemoryEventBus>,
        request_topic: &str,
    ) -> Self {
        let subscription = bus.subscribe(EventFilter::topic(request_topic));
        Self::with_publisher(directory, bus, subscription)
    }

    /// Create a responder from an existing subscription and a separate reply
    /// publisher.
    pub fn with_publisher(
        directory: Arc<dyn MerchantDirectory>,
        publisher: Arc<dyn EventPublisher>,
        subscription: Subscription,
    ) -> Self {
        Self {
            directory,
            publisher,
            subscription,
        }
    }

    /// Process requests until shutdown or the bus closes.
    #[instrument(skip_all, name = "lookup_responder")]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Lookup responder started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Lookup responder received shutdown signal");
                        break;
                    }
                }
                message = self.subscription.recv() => match message {
                    Some(message) => {
                        self.handle_message(&message).await;
                    }
                    None => {
                        warn!("Event bus closed, stopping lookup responder");
                        break;
                    }
                }
            }
        }
    }

    /// Handle one request message.
    pub async fn handle_message(&self, message: &BusMessage) -> ResponderOutcome {
        let request = match LookupRequest::from_slice(&message.payload) {
            Ok(request) => request,
            Err(e) => {
                MALFORMED_MESSAGES.with_label_values(&["responder"]).inc();
                warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Dropping malformed lookup request"
                );
                return ResponderOutcome::Dropped;
            }
        };

        if request.reply_to.trim().is_empty() || request.correlation_id.is_empty() {
            MALFORMED_MESSAGES.with_label_values(&["responder"]).inc();
            warn!(
                message_id = %message.message_id,
                correlation_id = %request.correlation_id,
                "Dropping lookup request without reply_to or correlation_id"
            );
            return ResponderOutcome::Dropped;
        }

        let reply = self.lookup(&request).await;
        let outcome = if reply.valid {
            ResponderOutcome::Found
        } else {
            ResponderOutcome::NotFound
        };

        let payload = match reply.to_bytes() {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                warn!(correlation_id = %request.correlation_id, error = %e, "Failed to encode reply");
                return ResponderOutcome::ReplyFailed;
            }
        };

        match self.publisher.publish(&request.reply_to, payload).await {
            Ok(receivers) => {
                BUS_MESSAGES_PUBLISHED.with_label_values(&["reply"]).inc();
                debug!(
                    correlation_id = %request.correlation_id,
                    reply_to = %request.reply_to,
                    valid = reply.valid,
                    receivers = receivers,
                    "Published lookup reply"
                );
                outcome
            }
            Err(e) => {
                warn!(
                    correlation_id = %request.correlation_id,
                    reply_to = %request.reply_to,
                    error = %e,
                    "Failed to publish lookup reply"
                );
                ResponderOutcome::ReplyFailed
            }
        }
    }

    /// Authoritative lookup. Never fails: errors answer "not found".
    async fn lookup(&self, request: &LookupRequest) -> LookupReply {
        let api_key = match request.api_key() {
            Ok(key) => key,
            Err(e) => {
                RESPONDER_LOOKUPS.with_label_values(&["not_found"]).inc();
                debug!(correlation_id = %request.correlation_id, error = %e, "Unusable API key");
                return LookupReply::not_found(request.correlation_id.as_str());
            }
        };

        match self.directory.find_by_api_key(&api_key).await {
            Ok(Some(record)) if record.active => {
                RESPONDER_LOOKUPS.with_label_values(&["found"]).inc();
                debug!(
                    correlation_id = %request.correlation_id,
                    api_key = %api_key,
                    merchant_id = %record.id,
                    "API key resolved"
                );
                LookupReply::found(request.correlation_id.as_str(), record.id)
            }
            Ok(_) => {
                RESPONDER_LOOKUPS.with_label_values(&["not_found"]).inc();
                debug!(
                    correlation_id = %request.correlation_id,
                    api_key = %api_key,
                    "API key not found"
                );
                LookupReply::not_found(request.correlation_id.as_str())
            }
            Err(e) => {
                RESPONDER_LOOKUPS.with_label_values(&["error"]).inc();
                warn!(
                    correlation_id = %request.correlation_id,
                    api_key = %api_key,
                    error = %e,
                    "Directory lookup failed, answering not found"
                );
                LookupReply::not_found(request.correlation_id.as_str())
            }
        }
    }
}
