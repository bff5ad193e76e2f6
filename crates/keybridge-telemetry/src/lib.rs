//! # Keybridge Telemetry
//!
//! Observability for the API-key bridge.
//!
//! ## Components
//!
//! - **Logs**: `tracing` with an env filter and pretty or JSON console output
//! - **Traces**: optional OpenTelemetry OTLP export
//! - **Metrics**: Prometheus counters, gauges and histograms for the bridge,
//!   the cache and the responder
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keybridge_telemetry::{TelemetryConfig, init_telemetry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).await.expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset | OTLP endpoint; export disabled when unset |
//! | `OTEL_SERVICE_NAME` | `keybridge` | Service name in traces |
//! | `KB_LOG_LEVEL` | `info` | Log level filter |
//! | `KB_JSON_LOGS` | `false` | JSON log lines |
//! | `KB_COMPONENT` | `node` | Component identifier |

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    register_metrics, HistogramTimer, MetricsHandle, BRIDGE_CALLS,
    BRIDGE_LATENCY, BUS_MESSAGES_PUBLISHED, CACHE_LOOKUPS, MALFORMED_MESSAGES, PENDING_CALLS,
    RESPONDER_LOOKUPS, UNMATCHED_REPLIES,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging, tracing and metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
/// When dropped, it flushes pending spans.
pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;
    let tracing_guard = tracing_setup::init_tracing(&config).await?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active. Drop to flush and shutdown.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
