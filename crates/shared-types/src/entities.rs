//! # Core Domain Entities
//!
//! Identity types resolved by the API-key bridge.

use crate::errors::{ApiKeyError, MerchantIdError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Upper bound on accepted API key length.
pub const MAX_API_KEY_LEN: usize = 256;

/// Number of leading characters kept when an API key is displayed.
const REDACTED_PREFIX_LEN: usize = 4;

// =============================================================================
// API KEY
// =============================================================================

/// Opaque client-supplied API key.
///
/// Held byte for byte as supplied: no trimming or case folding, so `"abc123 "`
/// and `"abc123"` are different keys. Blank keys and keys longer than
/// [`MAX_API_KEY_LEN`] bytes are rejected.
///
/// `Display` and `Debug` never print the full key, so it is safe to pass an
/// `ApiKey` straight into `tracing` fields.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    /// Parse a raw key as is.
    pub fn parse(raw: &str) -> Result<Self, ApiKeyError> {
        if raw.trim().is_empty() {
            return Err(ApiKeyError::Empty);
        }
        if raw.len() > MAX_API_KEY_LEN {
            return Err(ApiKeyError::TooLong {
                len: raw.len(),
                max: MAX_API_KEY_LEN,
            });
        }
        Ok(Self(raw.to_string()))
    }

    /// The raw key. Only the wire codec and the directory should need this.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// SHA-256 digest of the key.
    #[must_use]
    pub fn digest(&self) -> ApiKeyDigest {
        ApiKeyDigest::of(&self.0)
    }

    /// Redacted form used in logs.
    #[must_use]
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(REDACTED_PREFIX_LEN).collect();
        format!("{prefix}****")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.redacted())
    }
}

/// SHA-256 digest of an API key, used as the directory index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiKeyDigest([u8; 32]);

impl ApiKeyDigest {
    /// Digest a raw key.
    #[must_use]
    pub fn of(raw: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(raw.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

// =============================================================================
// MERCHANT
// =============================================================================

/// Merchant identifier as issued by the merchant registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerchantId(i64);

impl MerchantId {
    /// Wrap a raw identifier. Returns `None` for zero or negative values,
    /// which the wire format reserves for "no identity".
    #[must_use]
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    /// The raw identifier.
    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MerchantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MerchantId {
    type Err = MerchantIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| MerchantIdError::NotANumber(s.to_string()))?;
        Self::new(raw).ok_or(MerchantIdError::Reserved(raw))
    }
}

/// A merchant as held by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantRecord {
    /// Merchant identifier.
    pub id: MerchantId,
    /// Display name.
    pub name: String,
    /// Suspended merchants do not resolve.
    pub active: bool,
}

impl MerchantRecord {
    /// Create an active merchant record.
    pub fn active(id: MerchantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
        }
    }
}
