//! # Shared Bus - Topic-Routed Message Bus
//!
//! Stand-in for the message broker that connects gateway instances to the
//! merchant service. There is no synchronous channel between the two sides;
//! everything flows through topics.
//!
//! ```text
//! ┌──────────────┐  publish(lookup)   ┌──────────────┐  subscribe(lookup)  ┌──────────────┐
//! │ Gateway (n)  │ ─────────────────→ │  Event Bus   │ ──────────────────→ │  Responder   │
//! │              │ ←───────────────── │              │ ←────────────────── │              │
//! └──────────────┘ subscribe(reply.n) └──────────────┘   publish(reply.n)  └──────────────┘
//! ```
//!
//! ## Delivery Semantics
//!
//! - Topic-based routing, no ordering guarantee callers may rely on.
//! - A message published with no matching subscriber is dropped.
//! - A subscriber that falls behind the channel capacity loses messages.
//! - Consumers must tolerate duplicates (at-least-once upstream).

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{BusMessage, EventFilter};
pub use publisher::{EventPublisher, InMemoryEventBus, PublishError};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum messages to buffer per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Subscription key used for filters that accept every topic.
pub(crate) const ALL_TOPICS_KEY: &str = "*";
