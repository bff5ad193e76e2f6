//! In-memory merchant directory indexed by API-key digest.

use crate::ports::outbound::{DirectoryError, MerchantDirectory};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{ApiKey, ApiKeyDigest, MerchantId, MerchantRecord};
use std::collections::HashMap;
use tracing::debug;

/// Merchants keyed by the SHA-256 digest of their API key. Raw keys are not
/// retained.
#[derive(Default)]
pub struct InMemoryMerchantDirectory {
    merchants: RwLock<HashMap<ApiKeyDigest, MerchantRecord>>,
}

impl InMemoryMerchantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding one active merchant per `(key, id)` pair.
    pub fn seeded<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (ApiKey, MerchantId)>,
    {
        let directory = Self::new();
        for (key, id) in entries {
            directory.insert(&key, MerchantRecord::active(id, format!("merchant-{id}")));
        }
        directory
    }

    /// Bind `api_key` to `record`, returning the previous binding.
    pub fn insert(&self, api_key: &ApiKey, record: MerchantRecord) -> Option<MerchantRecord> {
        debug!(api_key = %api_key, merchant_id = %record.id, "Registering API key");
        self.merchants.write().insert(api_key.digest(), record)
    }

    /// Mark the merchant behind `api_key` inactive. False if the key is unknown.
    pub fn suspend(&self, api_key: &ApiKey) -> bool {
        match self.merchants.write().get_mut(&api_key.digest()) {
            Some(record) => {
                record.active = false;
                true
            }
            None => false,
        }
    }

    /// Revoke `api_key`.
    pub fn remove(&self, api_key: &ApiKey) -> Option<MerchantRecord> {
        self.merchants.write().remove(&api_key.digest())
    }

    pub fn len(&self) -> usize {
        self.merchants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.merchants.read().is_empty()
    }
}

#[async_trait]
impl MerchantDirectory for InMemoryMerchantDirectory {
    async fn find_by_api_key(
        &self,
        api_key: &ApiKey,
    ) -> Result<Option<MerchantRecord>, DirectoryError> {
        let merchants = self.merchants.read();
        Ok(merchants
            .get(&api_key.digest())
            .filter(|record| record.active)
            .cloned())
    }
}
