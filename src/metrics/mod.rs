//! Prometheus metrics for the sync engine
//!
//! This module provides metrics tracking for:
//! - Cycles: completed and skipped cycles, cycle duration
//! - Endpoints: reachability, metadata query failures
//! - Publishing: outcomes per endpoint, rate-limit signals, persistence failures
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops. The daemon
//! exports them with [`write_textfile`] after every cycle when
//! `monitor.metrics_file` is set.

use prometheus::{
    register_counter, register_counter_vec, register_gauge_vec, register_histogram, Counter,
    CounterVec, Encoder, GaugeVec, Histogram, TextEncoder,
};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all sync metrics
struct WatchMetrics {
    cycles: CounterVec,
    cycle_duration: Histogram,
    endpoint_reachable: GaugeVec,
    metadata_failures: CounterVec,
    publish_outcomes: CounterVec,
    rate_limits: Counter,
    persistence_failures: Counter,
}

/// Global storage for sync metrics
static WATCH_METRICS: OnceLock<WatchMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, errors are logged and subsequent
/// metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = serverwatch::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
///     // Application can continue without metrics
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = WatchMetrics {
        cycles: register_counter_vec!(
            "serverwatch_cycles_total",
            "Total sync cycles by result",
            &["result"]
        )?,
        cycle_duration: register_histogram!(
            "serverwatch_cycle_duration_seconds",
            "Time spent on one sync cycle in seconds",
            vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
        )?,
        endpoint_reachable: register_gauge_vec!(
            "serverwatch_endpoint_reachable",
            "Whether the endpoint answered the last liveness probe (1 = yes, 0 = no)",
            &["endpoint"]
        )?,
        metadata_failures: register_counter_vec!(
            "serverwatch_metadata_failures_total",
            "Total failed metadata queries on reachable endpoints",
            &["endpoint"]
        )?,
        publish_outcomes: register_counter_vec!(
            "serverwatch_publish_outcomes_total",
            "Total publish outcomes by endpoint and outcome",
            &["endpoint", "outcome"]
        )?,
        rate_limits: register_counter!(
            "serverwatch_rate_limits_total",
            "Total rate-limit signals received from the channel"
        )?,
        persistence_failures: register_counter!(
            "serverwatch_persistence_failures_total",
            "Total failed writes of the bindings file"
        )?,
    };

    WATCH_METRICS
        .set(metrics)
        .map_err(|_| "Sync metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    WATCH_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Write all metrics to `path` for a node_exporter textfile collector
///
/// The file is replaced atomically so the collector never reads a partial
/// scrape.
pub fn write_textfile(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = encode_metrics()?;

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    std::fs::write(&temp_path, text)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a cycle timer (returns a timer handle)
pub fn start_cycle_timer() -> MetricsTimer {
    match WATCH_METRICS.get() {
        Some(m) => MetricsTimer::new(m.cycle_duration.start_timer()),
        None => MetricsTimer::noop(),
    }
}

/// Record the end of a cycle (`completed` or `skipped`)
pub fn record_cycle(result: &str) {
    if let Some(m) = WATCH_METRICS.get() {
        m.cycles.with_label_values(&[result]).inc();
    }
}

/// Update the reachability gauge of an endpoint
pub fn set_endpoint_reachable(endpoint: &str, reachable: bool) {
    if let Some(m) = WATCH_METRICS.get() {
        m.endpoint_reachable
            .with_label_values(&[endpoint])
            .set(if reachable { 1.0 } else { 0.0 });
    }
}

/// Record a failed metadata query
pub fn record_metadata_failure(endpoint: &str) {
    if let Some(m) = WATCH_METRICS.get() {
        m.metadata_failures.with_label_values(&[endpoint]).inc();
    }
}

/// Record the publish outcome of an endpoint
pub fn record_publish_outcome(endpoint: &str, outcome: &str) {
    if let Some(m) = WATCH_METRICS.get() {
        m.publish_outcomes
            .with_label_values(&[endpoint, outcome])
            .inc();
    }
}

/// Record a rate-limit signal
pub fn record_rate_limit() {
    if let Some(m) = WATCH_METRICS.get() {
        m.rate_limits.inc();
    }
}

/// Record a failed bindings write
pub fn record_persistence_failure() {
    if let Some(m) = WATCH_METRICS.get() {
        m.persistence_failures.inc();
    }
}
