//! Cache-Aside Wrapper in front of the bridge.
//!
//! Positive resolutions are cached for a fixed TTL. Negative results,
//! timeouts and publish failures are never cached, so a newly provisioned key
//! works on its next call and a responder outage cannot poison the cache.

use crate::ports::outbound::{ApiKeyValidator, CacheError, CacheStore};
use keybridge_telemetry::CACHE_LOOKUPS;
use shared_types::{ApiKey, MerchantId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Prefix of every cache key written by the resolver.
pub const CACHE_KEY_PREFIX: &str = "merchant_api_key:";

/// Lifetime of a cached resolution.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Cache key for `api_key`. The API key alone identifies the entry, on both
/// the read and the write path.
pub fn cache_key(api_key: &ApiKey) -> String {
    format!("{CACHE_KEY_PREFIX}{}", api_key.expose())
}

/// Resolves API keys to merchants, consulting the cache first.
///
/// Concurrent misses for one key may each call the validator; there is no
/// single-flight collapsing.
pub struct ApiKeyResolver {
    cache: Arc<dyn CacheStore>,
    validator: Arc<dyn ApiKeyValidator>,
    ttl: Duration,
}

impl ApiKeyResolver {
    pub fn new(cache: Arc<dyn CacheStore>, validator: Arc<dyn ApiKeyValidator>) -> Self {
        Self::with_ttl(cache, validator, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(
        cache: Arc<dyn CacheStore>,
        validator: Arc<dyn ApiKeyValidator>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            validator,
            ttl,
        }
    }

    /// Merchant owning `raw_key`, or `None`.
    ///
    /// Fails closed: a blank key, a confirmed miss, a timeout and a transport
    /// failure all return `None`.
    #[instrument(skip_all)]
    pub async fn resolve_api_key(&self, raw_key: &str) -> Option<MerchantId> {
        let api_key = match ApiKey::parse(raw_key) {
            Ok(key) => key,
            Err(e) => {
                debug!(error = %e, "Rejecting unusable API key");
                return None;
            }
        };
        let key = cache_key(&api_key);

        if let Some(merchant) = self.cached(&key, &api_key).await {
            return Some(merchant);
        }

        match self.validator.validate(&api_key).await {
            Ok(Some(merchant)) => {
                if let Err(e) = self
                    .cache
                    .set(&key, merchant.to_string(), self.ttl)
                    .await
                {
                    warn!(api_key = %api_key, error = %e, "Failed to cache resolved API key");
                }
                Some(merchant)
            }
            Ok(None) => {
                debug!(api_key = %api_key, "API key not found");
                None
            }
            Err(e) => {
                warn!(
                    api_key = %api_key,
                    error = %e,
                    timed_out = e.is_timeout(),
                    "API key validation failed, denying"
                );
                None
            }
        }
    }

    /// Drop the cached resolution of `raw_key`, e.g. after revocation.
    pub async fn invalidate(&self, raw_key: &str) -> Result<(), CacheError> {
        let Ok(api_key) = ApiKey::parse(raw_key) else {
            return Ok(());
        };
        self.cache.delete(&cache_key(&api_key)).await?;
        debug!(api_key = %api_key, "Cached API key invalidated");
        Ok(())
    }

    /// Cached merchant for `key`. Store errors and corrupt entries count as
    /// misses; corrupt entries are deleted.
    async fn cached(&self, key: &str, api_key: &ApiKey) -> Option<MerchantId> {
        let raw = match self.cache.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
                return None;
            }
            Err(e) => {
                CACHE_LOOKUPS.with_label_values(&["error"]).inc();
                warn!(api_key = %api_key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match raw.parse::<MerchantId>() {
            Ok(merchant) => {
                CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
                Some(merchant)
            }
            Err(e) => {
                CACHE_LOOKUPS.with_label_values(&["corrupt"]).inc();
                warn!(api_key = %api_key, error = %e, "Discarding corrupt cache entry");
                if let Err(e) = self.cache.delete(key).await {
                    warn!(api_key = %api_key, error = %e, "Failed to delete corrupt cache entry");
                }
                None
            }
        }
    }
}
