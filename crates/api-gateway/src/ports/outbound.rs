//! Outbound ports for the API Gateway.

use crate::domain::error::BridgeError;
use async_trait::async_trait;
use shared_types::{ApiKey, LookupRequest, MerchantId};
use std::time::Duration;
use thiserror::Error;

/// Cache store errors
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache operation failed: {0}")]
    Backend(String),
}

/// Key-value cache with per-entry expiry.
///
/// Entries are advisory; callers treat every error as a miss.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` for `ttl`. Last writer wins.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Emits lookup requests onto the shared request channel.
#[async_trait]
pub trait RequestPublisher: Send + Sync {
    /// Serialize and publish. Errors are returned immediately, never retried.
    async fn publish(&self, request: &LookupRequest) -> Result<(), BridgeError>;
}

/// Authoritative API-key validation.
///
/// `Ok(None)` means the key was confirmed unknown; errors mean no answer.
#[async_trait]
pub trait ApiKeyValidator: Send + Sync {
    async fn validate(&self, api_key: &ApiKey) -> Result<Option<MerchantId>, BridgeError>;
}
