//! # Node Configuration
//!
//! Unified configuration for the bus, the gateway bridge and the merchant
//! directory seed.

use api_gateway::{BridgeConfig, ConfigError};
use keybridge_telemetry::TelemetryConfig;
use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use shared_types::{ApiKey, MerchantId};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum NodeConfigError {
    #[error("invalid bridge configuration: {0}")]
    Bridge(#[from] ConfigError),

    #[error("invalid KB_BUS_CAPACITY: {0:?}")]
    InvalidBusCapacity(String),

    #[error("invalid seed merchant entry {entry:?}: {reason}")]
    InvalidSeed { entry: String, reason: String },
}

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Gateway bridge configuration.
    pub bridge: BridgeConfig,
    /// Event bus buffer per subscriber.
    pub bus_capacity: usize,
    /// Merchants loaded into the directory at startup.
    pub seed_merchants: Vec<(ApiKey, MerchantId)>,
    /// Logging and metrics.
    pub telemetry: TelemetryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            bus_capacity: DEFAULT_CHANNEL_CAPACITY,
            seed_merchants: Vec::new(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load from the environment.
    ///
    /// Reads every `KB_*` variable understood by [`BridgeConfig::from_env`],
    /// plus `KB_BUS_CAPACITY` and `KB_SEED_MERCHANTS` (`key=id,key=id`).
    pub fn from_env() -> Result<Self, NodeConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, NodeConfigError> {
        let bridge = BridgeConfig::from_lookup(&lookup)?;

        let bus_capacity = match lookup("KB_BUS_CAPACITY") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(capacity) if capacity > 0 => capacity,
                _ => return Err(NodeConfigError::InvalidBusCapacity(raw)),
            },
            None => DEFAULT_CHANNEL_CAPACITY,
        };

        let seed_merchants = match lookup("KB_SEED_MERCHANTS") {
            Some(raw) => parse_seed_merchants(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            bridge,
            bus_capacity,
            seed_merchants,
            telemetry: TelemetryConfig::from_env(),
        })
    }
}

/// Parse `key=id,key=id`. Blank entries are skipped.
pub fn parse_seed_merchants(raw: &str) -> Result<Vec<(ApiKey, MerchantId)>, NodeConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let invalid = |reason: String| NodeConfigError::InvalidSeed {
                entry: redact_entry(entry),
                reason,
            };
            let (key, id) = entry
                .split_once('=')
                .ok_or_else(|| invalid("expected key=id".into()))?;
            let key = ApiKey::parse(key.trim()).map_err(|e| invalid(e.to_string()))?;
            let id = id.parse::<MerchantId>().map_err(|e| invalid(e.to_string()))?;
            Ok((key, id))
        })
        .collect()
}

/// Keep keys out of error messages.
fn redact_entry(entry: &str) -> String {
    match entry.split_once('=') {
        Some((key, id)) => match ApiKey::parse(key) {
            Ok(key) => format!("{key}={id}"),
            Err(_) => format!("={id}"),
        },
        None => "****".to_string(),
    }
}
