//! Prometheus metrics for the engine bridge.
//!
//! All metrics follow the naming convention: `eb_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // ENGINE PROCESS METRICS
    // =========================================================================

    /// Engine subprocesses started
    pub static ref ENGINES_SPAWNED: CounterVec = CounterVec::new(
        Opts::new("eb_engine_spawned_total", "Engine subprocesses started"),
        &["protocol"]  // protocol: openpgp/cms
    ).expect("metric creation failed");

    /// Engine spawn failures
    pub static ref SPAWN_FAILURES: Counter = Counter::new(
        "eb_engine_spawn_failures_total",
        "Engine subprocesses or channels that could not be created"
    ).expect("metric creation failed");

    // =========================================================================
    // STATUS PROTOCOL METRICS
    // =========================================================================

    /// Status events dispatched to handler chains
    pub static ref STATUS_EVENTS: CounterVec = CounterVec::new(
        Opts::new("eb_status_events_total", "Status events dispatched"),
        &["code"]
    ).expect("metric creation failed");

    /// Status lines without a recognizable code token
    pub static ref MALFORMED_STATUS_LINES: Counter = Counter::new(
        "eb_status_malformed_lines_total",
        "Status lines reported as protocol errors"
    ).expect("metric creation failed");

    // =========================================================================
    // OPERATION METRICS
    // =========================================================================

    /// Operations completed by outcome
    pub static ref OPERATIONS_COMPLETED: CounterVec = CounterVec::new(
        Opts::new("eb_operations_completed_total", "Operations completed"),
        &["outcome"]  // outcome: success or an error label
    ).expect("metric creation failed");

    /// Operation wall time from start to completion
    pub static ref OPERATION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "eb_operation_duration_seconds",
            "Time from operation start to completion"
        ).buckets(exponential_buckets(0.001, 2.0, 15).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // TRACE METRICS
    // =========================================================================

    /// Transaction trace blocks published into the sink
    pub static ref TRACE_BLOCKS_FLUSHED: Counter = Counter::new(
        "eb_trace_blocks_flushed_total",
        "Transaction trace blocks published"
    ).expect("metric creation failed");
}

/// Handle for the metrics registry
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    registry: Registry,
}

impl MetricsHandle {
    /// Render all registered metrics in the text exposition format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        encode_registry(&self.registry)
    }
}

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Engine
        Box::new(ENGINES_SPAWNED.clone()),
        Box::new(SPAWN_FAILURES.clone()),
        // Status
        Box::new(STATUS_EVENTS.clone()),
        Box::new(MALFORMED_STATUS_LINES.clone()),
        // Operations
        Box::new(OPERATIONS_COMPLETED.clone()),
        Box::new(OPERATION_DURATION.clone()),
        // Trace
        Box::new(TRACE_BLOCKS_FLUSHED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::Metrics(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: REGISTRY.clone(),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    encode_registry(&REGISTRY)
}

fn encode_registry(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
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
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_twice() {
        register_metrics().unwrap();
        register_metrics().unwrap();
    }

    #[test]
    fn test_encode_includes_engine_metrics() {
        let handle = register_metrics().unwrap();
        ENGINES_SPAWNED.with_label_values(&["openpgp"]).inc();
        let text = handle.encode().unwrap();
        assert!(text.contains("eb_engine_spawned_total"));
    }

    #[test]
    fn test_histogram_timer_observes_on_drop() {
        let before = OPERATION_DURATION.get_sample_count();
        {
            let _timer = HistogramTimer::new(&OPERATION_DURATION);
        }
        assert!(OPERATION_DURATION.get_sample_count() > before);
    }
}
