//! Prometheus metrics for the API-key bridge.
//!
//! All metrics follow the naming convention: `kb_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., bridge calls by outcome)
//! - **Gauge**: Value that can go up or down (e.g., pending calls)
//! - **Histogram**: Distribution of values (e.g., bridge round-trip latency)

use lazy_static::lazy_static;
use prometheus::{exponential_buckets, Counter, CounterVec, Gauge, Histogram, Opts, Registry};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // BRIDGE METRICS (gateway side)
    // =========================================================================

    /// Bridge calls by terminal outcome
    pub static ref BRIDGE_CALLS: CounterVec = CounterVec::new(
        Opts::new("kb_bridge_calls_total", "Bridge calls by terminal outcome"),
        &["outcome"]  // found, not_found, timed_out, publish_failed, abandoned, cancelled
    ).expect("metric creation failed");

    /// Time a bridge call spent waiting after its request was published
    pub static ref BRIDGE_LATENCY: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "kb_bridge_wait_seconds",
            "Time from request publish to settlement, deadline or abandonment"
        ).buckets(exponential_buckets(0.0005, 2.0, 14).expect("bucket layout"))
    ).expect("metric creation failed");

    /// Calls currently waiting for a reply
    pub static ref PENDING_CALLS: Gauge = Gauge::new(
        "kb_bridge_pending_calls",
        "Calls registered and not yet settled, timed out or cancelled"
    ).expect("metric creation failed");

    /// Replies that matched no pending call (late, duplicate, or foreign)
    pub static ref UNMATCHED_REPLIES: Counter = Counter::new(
        "kb_bridge_unmatched_replies_total",
        "Replies dropped because no pending call matched"
    ).expect("metric creation failed");

    // =========================================================================
    // CACHE METRICS (gateway side)
    // =========================================================================

    /// Cache lookups by result
    pub static ref CACHE_LOOKUPS: CounterVec = CounterVec::new(
        Opts::new("kb_cache_lookups_total", "API key cache lookups by result"),
        &["result"]  // hit, miss, error, corrupt
    ).expect("metric creation failed");

    // =========================================================================
    // RESPONDER METRICS (merchant registry side)
    // =========================================================================

    /// Responder lookups by result
    pub static ref RESPONDER_LOOKUPS: CounterVec = CounterVec::new(
        Opts::new("kb_responder_lookups_total", "Directory lookups answered by the responder"),
        &["result"]  // found, not_found, error
    ).expect("metric creation failed");

    // =========================================================================
    // BUS METRICS
    // =========================================================================

    /// Messages published on the bus by kind
    pub static ref BUS_MESSAGES_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("kb_bus_messages_published_total", "Messages published via the bus"),
        &["kind"]  // request, reply
    ).expect("metric creation failed");

    /// Messages that could not be decoded
    pub static ref MALFORMED_MESSAGES: CounterVec = CounterVec::new(
        Opts::new("kb_bus_malformed_messages_total", "Undecodable messages dropped"),
        &["side"]  // gateway, responder
    ).expect("metric creation failed");
}

/// Handle for the metrics registry
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; already-registered collectors are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Bridge
        Box::new(BRIDGE_CALLS.clone()),
        Box::new(BRIDGE_LATENCY.clone()),
        Box::new(PENDING_CALLS.clone()),
        Box::new(UNMATCHED_REPLIES.clone()),
        // Cache
        Box::new(CACHE_LOOKUPS.clone()),
        // Responder
        Box::new(RESPONDER_LOOKUPS.clone()),
        // Bus
        Box::new(BUS_MESSAGES_PUBLISHED.clone()),
        Box::new(MALFORMED_MESSAGES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
