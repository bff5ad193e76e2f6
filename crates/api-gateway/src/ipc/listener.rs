//! Reply Listener: routes replies from the private reply topic to the
//! pending-call registry.

use crate::domain::correlation::CorrelationId;
use crate::domain::pending::PendingCallRegistry;
use keybridge_telemetry::MALFORMED_MESSAGES;
use shared_bus::{BusMessage, Subscription};
use shared_types::LookupReply;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Single consumer of one gateway instance's reply topic.
///
/// Must be the only listener on that topic; the subscription is taken before
/// any request is published so no reply can slip past it.
pub struct ReplyListener {
    registry: Arc<PendingCallRegistry>,
    subscription: Subscription,
}

impl ReplyListener {
    pub fn new(registry: Arc<PendingCallRegistry>, subscription: Subscription) -> Self {
        Self {
            registry,
            subscription,
        }
    }

    /// Run the listener loop until shutdown or the bus closes.
    #[instrument(skip_all, name = "reply_listener", fields(topics = ?self.subscription.filter().topics))]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Reply listener started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Reply listener received shutdown signal");
                        break;
                    }
                }
                message = self.subscription.recv() => match message {
                    Some(message) => {
                        self.handle_message(&message);
                    }
                    None => {
                        warn!("Event bus closed, stopping reply listener");
                        break;
                    }
                }
            }
        }

        let lagged = self.subscription.lagged();
        if lagged > 0 {
            warn!(lagged = lagged, "Reply listener lost messages while running");
        }
    }

    /// Decode one message and settle the matching call.
    ///
    /// Returns true if a waiting call was settled. Malformed payloads are
    /// logged and dropped; the affected call eventually times out.
    pub fn handle_message(&self, message: &BusMessage) -> bool {
        let reply = match LookupReply::from_slice(&message.payload) {
            Ok(reply) => reply,
            Err(e) => {
                MALFORMED_MESSAGES.with_label_values(&["gateway"]).inc();
                warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Dropping malformed lookup reply"
                );
                return false;
            }
        };

        let correlation_id = match CorrelationId::parse(&reply.correlation_id) {
            Ok(id) => id,
            Err(e) => {
                MALFORMED_MESSAGES.with_label_values(&["gateway"]).inc();
                warn!(
                    message_id = %message.message_id,
                    correlation_id = %reply.correlation_id,
                    error = %e,
                    "Dropping lookup reply with invalid correlation ID"
                );
                return false;
            }
        };

        let settled = self.registry.settle(&correlation_id, reply);
        if !settled {
            debug!(
                correlation_id = %correlation_id,
                "Late or duplicate reply dropped"
            );
        }
        settled
    }
}
