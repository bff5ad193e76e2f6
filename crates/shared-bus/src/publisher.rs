//! # Event Publisher
//!
//! Defines the publishing side of the event bus.

use crate::events::{BusMessage, EventFilter};
use crate::subscriber::Subscription;
use crate::{ALL_TOPICS_KEY, DEFAULT_CHANNEL_CAPACITY};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors from publish operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The bus is shut down (broker unreachable).
    #[error("Event bus closed")]
    Closed,

    /// Topic name was empty.
    #[error("Invalid topic: {0:?}")]
    InvalidTopic(String),
}

/// Trait for publishing messages to the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `payload` on `topic`.
    ///
    /// # Returns
    ///
    /// The number of subscribers whose filter accepts the topic. Zero is not
    /// an error: the message is simply dropped.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<usize, PublishError>;

    /// Get the total number of messages published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the event bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics;
/// each subscription filters by topic on receive. Suitable for single-process
/// operation and tests; a deployment with separate gateway and merchant
/// processes would put a broker behind `EventPublisher` instead.
pub struct InMemoryEventBus {
    /// Broadcast sender. `None` once the bus has been closed.
    sender: RwLock<Option<broadcast::Sender<BusMessage>>>,

    /// Active subscription count by topic.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total messages published.
    events_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: RwLock::new(Some(sender)),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to messages matching a filter.
    ///
    /// Subscribing to a closed bus yields a subscription that is already at
    /// end of stream.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = match self.sender.read() {
            Ok(guard) => guard.as_ref().map(broadcast::Sender::subscribe),
            Err(_) => None,
        };
        let receiver = receiver.unwrap_or_else(|| {
            let (_closed, receiver) = broadcast::channel(1);
            receiver
        });

        let topic_keys = topic_keys(&filter);
        if let Ok(mut subs) = self.subscriptions.write() {
            for key in &topic_keys {
                *subs.entry(key.clone()).or_insert(0) += 1;
            }
        }

        debug!(topics = ?filter.topics, "New subscription created");

        Subscription::new(receiver, filter, self.subscriptions.clone(), topic_keys)
    }

    /// Number of live subscriptions that would receive a message on `topic`.
    #[must_use]
    pub fn topic_subscribers(&self, topic: &str) -> usize {
        let Ok(subs) = self.subscriptions.read() else {
            return 0;
        };
        subs.get(topic).copied().unwrap_or(0) + subs.get(ALL_TOPICS_KEY).copied().unwrap_or(0)
    }

    /// Get the number of active subscribers across all topics.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        match self.sender.read() {
            Ok(guard) => guard.as_ref().map_or(0, broadcast::Sender::receiver_count),
            Err(_) => 0,
        }
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shut the bus down.
    ///
    /// Live subscriptions drain what is buffered and then end; every later
    /// publish fails with [`PublishError::Closed`].
    pub fn close(&self) {
        if let Ok(mut guard) = self.sender.write() {
            if guard.take().is_some() {
                warn!("Event bus closed");
            }
        }
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.read().map_or(true, |guard| guard.is_none())
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<usize, PublishError> {
        if topic.is_empty() {
            return Err(PublishError::InvalidTopic(topic.to_string()));
        }

        let sender = match self.sender.read() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        let Some(sender) = sender else {
            return Err(PublishError::Closed);
        };

        self.events_published.fetch_add(1, Ordering::Relaxed);

        let message = BusMessage::new(topic, payload);
        let message_id = message.message_id;
        let interested = self.topic_subscribers(topic);

        if interested == 0 {
            warn!(
                topic = %topic,
                message_id = %message_id,
                "Message dropped (no subscribers for topic)"
            );
            return Ok(0);
        }

        match sender.send(message) {
            Ok(_) => {
                debug!(
                    topic = %topic,
                    message_id = %message_id,
                    receivers = interested,
                    "Message published"
                );
                Ok(interested)
            }
            Err(e) => {
                // Subscriptions went away between the count and the send
                warn!(
                    topic = %topic,
                    message_id = %message_id,
                    error = %e,
                    "Message dropped (no receivers)"
                );
                Ok(0)
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

/// Subscription-count keys for a filter.
fn topic_keys(filter: &EventFilter) -> Vec<String> {
    if filter.topics.is_empty() {
        vec![ALL_TOPICS_KEY.to_string()]
    } else {
        let mut keys = filter.topics.clone();
        keys.sort();
        keys.dedup();
        keys
    }
}
