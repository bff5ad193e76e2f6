//! Gateway error types.

use crate::domain::correlation::CorrelationId;
use shared_bus::PublishError;
use shared_types::WireError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single bridge call.
///
/// "Confirmed not found" is not an error: it is `Ok(None)` from
/// [`BridgeClient::validate`](crate::BridgeClient::validate).
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The request could not be written to the bus.
    #[error("failed to publish lookup request: {0}")]
    Publish(#[from] PublishError),

    /// No reply arrived before the deadline.
    #[error("no reply within {}ms", after.as_millis())]
    TimedOut { after: Duration },

    /// The pending entry was swept before a reply arrived.
    #[error("pending call was removed before a reply arrived")]
    Abandoned,

    /// A call with this correlation ID is already in flight.
    #[error("correlation id {0} is already pending")]
    DuplicateCorrelation(CorrelationId),

    /// The request could not be encoded.
    #[error("failed to encode lookup request: {0}")]
    Serialization(#[from] WireError),
}

impl BridgeError {
    /// Whether the call ended without any answer, as opposed to failing
    /// before the request left the gateway.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. } | Self::Abandoned)
    }

    /// Metric label for this outcome.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Publish(_) | Self::Serialization(_) => "publish_failed",
            Self::TimedOut { .. } => "timed_out",
            Self::Abandoned => "abandoned",
            Self::DuplicateCorrelation(_) => "duplicate",
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid cache TTL: {0}")]
    InvalidTtl(String),

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Invalid instance id: {0:?}")]
    InvalidInstanceId(String),

    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
}
