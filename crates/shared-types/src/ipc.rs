//! # Bus Message Payloads
//!
//! The two messages exchanged by the API-key bridge.
//!
//! ## Wire Schema
//!
//! ```text
//! request  (shared topic)        {"correlation_id": str, "api_key": str, "reply_to": str}
//! reply    (per-instance topic)  {"correlation_id": str, "valid": bool, "merchant_id": i64}
//! ```
//!
//! `merchant_id` is `0` whenever `valid` is `false`.

use crate::entities::{ApiKey, MerchantId};
use crate::errors::{ApiKeyError, WireError};
use serde::{Deserialize, Serialize};

// =============================================================================
// REQUEST
// =============================================================================

/// Lookup request published by a gateway instance.
/// Sender: Gateway | Receiver: Merchant Registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRequest {
    /// Correlation ID of the in-flight call.
    pub correlation_id: String,
    /// The API key to resolve.
    pub api_key: String,
    /// Topic the reply must be published to.
    pub reply_to: String,
}

impl LookupRequest {
    /// Build a request for `api_key`.
    pub fn new(
        correlation_id: impl Into<String>,
        api_key: &ApiKey,
        reply_to: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            api_key: api_key.expose().to_string(),
            reply_to: reply_to.into(),
        }
    }

    /// Validated key carried by the request.
    pub fn api_key(&self) -> Result<ApiKey, ApiKeyError> {
        ApiKey::parse(&self.api_key)
    }

    /// Encode as JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, WireError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// =============================================================================
// REPLY
// =============================================================================

/// Lookup reply published by the merchant registry.
/// Sender: Merchant Registry | Receiver: Gateway (reply_to topic)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupReply {
    /// Correlation ID copied from the request.
    pub correlation_id: String,
    /// Whether the key resolved to an active merchant.
    pub valid: bool,
    /// Merchant identifier, `0` when not valid.
    #[serde(default)]
    pub merchant_id: i64,
}

impl LookupReply {
    /// Positive reply.
    pub fn found(correlation_id: impl Into<String>, merchant: MerchantId) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            valid: true,
            merchant_id: merchant.get(),
        }
    }

    /// Negative reply.
    pub fn not_found(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            valid: false,
            merchant_id: 0,
        }
    }

    /// Resolved identity. A reply claiming `valid` with a reserved merchant
    /// ID is treated as not found.
    #[must_use]
    pub fn identity(&self) -> Option<MerchantId> {
        if self.valid {
            MerchantId::new(self.merchant_id)
        } else {
            None
        }
    }

    /// Encode as JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, WireError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
