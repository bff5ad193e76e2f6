//! # Outbound Ports (Driven Ports)
//!
//! The authoritative merchant data source the responder reads from.

use async_trait::async_trait;
use shared_types::{ApiKey, MerchantRecord};
use thiserror::Error;

/// Merchant directory errors
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    #[error("merchant directory unavailable: {0}")]
    Unavailable(String),

    #[error("merchant directory returned corrupt data: {0}")]
    Corrupt(String),
}

/// Lookup of merchants by API key.
///
/// Production: a database-backed store owned by the merchant service
/// Testing: `InMemoryMerchantDirectory`
#[async_trait]
pub trait MerchantDirectory: Send + Sync {
    /// Active merchant owning `api_key`, or `None` if the key is unknown or
    /// its merchant is suspended.
    async fn find_by_api_key(
        &self,
        api_key: &ApiKey,
    ) -> Result<Option<MerchantRecord>, DirectoryError>;
}
