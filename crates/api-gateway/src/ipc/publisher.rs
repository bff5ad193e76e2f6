//! Request Publisher over the shared bus.

use crate::domain::error::BridgeError;
use crate::ports::outbound::RequestPublisher;
use async_trait::async_trait;
use bytes::Bytes;
use keybridge_telemetry::BUS_MESSAGES_PUBLISHED;
use shared_bus::EventPublisher;
use shared_types::LookupRequest;
use std::sync::Arc;
use tracing::{debug, warn};

/// Publishes lookup requests on the shared request topic.
pub struct BusRequestPublisher {
    /// Reference to the event bus
    bus: Arc<dyn EventPublisher>,
    /// Shared request topic
    request_topic: String,
}

impl BusRequestPublisher {
    pub fn new(bus: Arc<dyn EventPublisher>, request_topic: impl Into<String>) -> Self {
        Self {
            bus,
            request_topic: request_topic.into(),
        }
    }

    /// Topic requests are published to.
    pub fn request_topic(&self) -> &str {
        &self.request_topic
    }
}

#[async_trait]
impl RequestPublisher for BusRequestPublisher {
    async fn publish(&self, request: &LookupRequest) -> Result<(), BridgeError> {
        let payload = Bytes::from(request.to_bytes()?);
        let receivers = self.bus.publish(&self.request_topic, payload).await?;
        BUS_MESSAGES_PUBLISHED.with_label_values(&["request"]).inc();

        if receivers == 0 {
            // Not a failure: the call will time out like any unanswered request
            warn!(
                correlation_id = %request.correlation_id,
                topic = %self.request_topic,
                "No subscribers for lookup request (responder may not be running)"
            );
        } else {
            debug!(
                correlation_id = %request.correlation_id,
                receivers = receivers,
                "Lookup request published"
            );
        }

        Ok(())
    }
}
