//! # Error Types
//!
//! Errors raised while constructing or decoding shared types.

use thiserror::Error;

/// Errors related to API key parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiKeyError {
    /// Key was empty or whitespace only.
    #[error("API key is empty")]
    Empty,

    /// Key exceeded the maximum accepted length.
    #[error("API key too long: {len} bytes (max {max})")]
    TooLong { len: usize, max: usize },
}

/// Errors parsing a merchant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerchantIdError {
    /// Not an integer.
    #[error("Merchant ID is not a number: {0}")]
    NotANumber(String),

    /// Zero and negative values mean "no identity".
    #[error("Merchant ID {0} is in the reserved range")]
    Reserved(i64),
}

/// Errors decoding a message taken off the bus.
#[derive(Debug, Error)]
pub enum WireError {
    /// Payload was not valid JSON for the expected schema.
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}
