//! # API Gateway - API-Key Bridge Client
//!
//! Resolves client-supplied API keys to merchant identities. The merchant
//! registry is only reachable over the message bus, so every lookup is a
//! request/reply exchange correlated by a per-call ID.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         API GATEWAY (instance n)                      │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  resolve_api_key(key)                                                 │
//! │        │                                                              │
//! │  ┌─────┴──────────────┐  hit   ┌──────────────┐                       │
//! │  │   ApiKeyResolver   │ ─────→ │  CacheStore  │                       │
//! │  │   (cache-aside)    │ ←───── │  (5 min TTL) │                       │
//! │  └─────┬──────────────┘        └──────────────┘                       │
//! │        │ miss                                                         │
//! │  ┌─────┴──────────────┐ register ┌─────────────────────┐              │
//! │  │    BridgeClient    │ ───────→ │ PendingCallRegistry │ ←── settle ─┐│
//! │  │ (deadline, guard)  │          │ (DashMap + oneshot) │             ││
//! │  └─────┬──────────────┘          └─────────────────────┘             ││
//! │        │ publish                                      ┌──────────────┴┐
//! │        ▼                                              │ ReplyListener ││
//! └────────┼──────────────────────────────────────────────┴───────▲───────┘
//!          │ merchant.api_key.lookup          merchant.api_key.reply.<n>
//!          ▼                                                      │
//!     Event Bus  ───────────→  Responder (merchant registry)  ────┘
//! ```
//!
//! ## Outcomes
//!
//! | `BridgeClient::validate` | Meaning |
//! |--------------------------|---------|
//! | `Ok(Some(id))` | Key resolved to an active merchant |
//! | `Ok(None)` | Registry confirmed the key is unknown |
//! | `Err(TimedOut)` | No answer within the deadline |
//! | `Err(Publish)` | Request never left the gateway |
//!
//! The resolver collapses every non-success outcome to `None` (fail closed)
//! and caches positive results only.
//!
//! ## Usage
//!
//! ```ignore
//! use api_gateway::{BridgeConfig, GatewayService, InMemoryCacheStore};
//!
//! let service = GatewayService::start(BridgeConfig::default(), bus, Arc::new(InMemoryCacheStore::new()))?;
//! let merchant = service.resolver().resolve_api_key("abc123").await;
//! service.shutdown().await;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ipc;
pub mod ports;
pub mod resolver;
pub mod service;

// Re-exports
pub use adapters::memory_cache::InMemoryCacheStore;
pub use domain::config::BridgeConfig;
pub use domain::correlation::CorrelationId;
pub use domain::error::{BridgeError, ConfigError};
pub use domain::pending::{sweep_task, CallState, PendingCallRegistry, PendingStats};
pub use ipc::handler::BridgeClient;
pub use ipc::listener::ReplyListener;
pub use ipc::publisher::BusRequestPublisher;
pub use ports::outbound::{ApiKeyValidator, CacheError, CacheStore, RequestPublisher};
pub use resolver::{cache_key, ApiKeyResolver, CACHE_KEY_PREFIX, DEFAULT_CACHE_TTL};
pub use service::GatewayService;
