//! Bridge configuration with validation.

use crate::domain::error::ConfigError;
use serde::{Deserialize, Serialize};
use shared_types::{reply_topic, LOOKUP_REQUEST_TOPIC};
use std::time::Duration;
use uuid::Uuid;

/// Default deadline for a bridge call.
pub const DEFAULT_TIMEOUT_MS: u64 = 3_000;

/// Default lifetime of a cached resolution.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default time a pending call may outlive its own deadline before the
/// sweeper removes it.
pub const DEFAULT_SWEEP_GRACE_MS: u64 = 3_000;

/// Default interval of the pending-call sweeper.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1_000;

/// Gateway-side bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Identifier of this gateway instance; names the private reply topic.
    pub instance_id: String,
    /// Shared request topic consumed by the responder.
    pub request_topic: String,
    /// Deadline applied when the caller does not supply one.
    pub default_timeout_ms: u64,
    /// Lifetime of a positive cache entry.
    pub cache_ttl_secs: u64,
    /// Pending entries that outlive their own deadline by more than this are
    /// swept.
    pub sweep_grace_ms: u64,
    /// How often the sweeper runs.
    pub sweep_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            request_topic: LOOKUP_REQUEST_TOPIC.to_string(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            sweep_grace_ms: DEFAULT_SWEEP_GRACE_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
        }
    }
}

impl BridgeConfig {
    /// Load from `KB_*` environment variables, falling back to defaults.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `KB_INSTANCE_ID` | `instance_id` |
    /// | `KB_REQUEST_TOPIC` | `request_topic` |
    /// | `KB_DEFAULT_TIMEOUT_MS` | `default_timeout_ms` |
    /// | `KB_CACHE_TTL_SECS` | `cache_ttl_secs` |
    /// | `KB_SWEEP_GRACE_MS` | `sweep_grace_ms` |
    /// | `KB_SWEEP_INTERVAL_MS` | `sweep_interval_ms` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(id) = lookup("KB_INSTANCE_ID") {
            config.instance_id = id.trim().to_string();
        }
        if let Some(topic) = lookup("KB_REQUEST_TOPIC") {
            config.request_topic = topic.trim().to_string();
        }
        if let Some(ms) = parse_var(&lookup, "KB_DEFAULT_TIMEOUT_MS")? {
            config.default_timeout_ms = ms;
        }
        if let Some(secs) = parse_var(&lookup, "KB_CACHE_TTL_SECS")? {
            config.cache_ttl_secs = secs;
        }
        if let Some(ms) = parse_var(&lookup, "KB_SWEEP_GRACE_MS")? {
            config.sweep_grace_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "KB_SWEEP_INTERVAL_MS")? {
            config.sweep_interval_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instance_id.is_empty() || self.instance_id.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidInstanceId(self.instance_id.clone()));
        }

        if self.request_topic.is_empty() {
            return Err(ConfigError::InvalidTopic(
                "request_topic cannot be empty".into(),
            ));
        }

        if self.default_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "default_timeout_ms cannot be 0".into(),
            ));
        }

        if self.sweep_grace_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "sweep_grace_ms cannot be 0".into(),
            ));
        }

        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "sweep_interval_ms cannot be 0".into(),
            ));
        }

        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::InvalidTtl("cache_ttl_secs cannot be 0".into()));
        }

        Ok(())
    }

    /// Private reply topic of this instance.
    pub fn reply_topic(&self) -> String {
        reply_topic(&self.instance_id)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn sweep_grace(&self) -> Duration {
        Duration::from_millis(self.sweep_grace_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

fn parse_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value: raw,
        })
}
