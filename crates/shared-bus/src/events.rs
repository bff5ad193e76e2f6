//! # Bus Messages
//!
//! The envelope carried by the bus and the filter used to select it.

use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// A message in flight on the bus.
///
/// The payload is opaque to the bus; producers and consumers agree on the
/// encoding per topic.
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// Unique per publish (a redelivery of the same payload gets a new ID).
    pub message_id: Uuid,
    /// Routing topic.
    pub topic: String,
    /// Encoded payload.
    pub payload: Bytes,
    /// Publish time, milliseconds since the Unix epoch.
    pub published_at_ms: u64,
}

impl BusMessage {
    /// Wrap a payload for `topic`.
    pub fn new(topic: impl Into<String>, payload: Bytes) -> Self {
        let published_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            message_id: Uuid::new_v4(),
            topic: topic.into(),
            payload,
            published_at_ms,
        }
    }
}

/// Filter for subscribing to specific topics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<String>,
}

impl EventFilter {
    /// Create a filter that accepts all messages.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for a single topic.
    #[must_use]
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topics: vec![topic.into()],
        }
    }

    /// Create a filter for several topics.
    #[must_use]
    pub fn topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if a topic passes this filter.
    #[must_use]
    pub fn accepts(&self, topic: &str) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| t == topic)
    }

    /// Check if a message matches this filter.
    #[must_use]
    pub fn matches(&self, message: &BusMessage) -> bool {
        self.accepts(&message.topic)
    }
}
