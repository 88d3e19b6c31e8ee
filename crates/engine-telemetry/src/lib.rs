//! # Engine Telemetry
//!
//! Diagnostics for the engine bridge.
//!
//! ## Components
//!
//! - **Trace sink**: process-wide, lock-protected diagnostic output with a
//!   verbosity threshold read once from `EB_DEBUG`
//! - **Transaction traces**: per-transaction staging buffers published into
//!   the sink as one contiguous block
//! - **Logging**: `tracing` subscriber setup, bridged into the sink
//! - **Metrics**: Prometheus counters for engines, status events, operations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use engine_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `EB_DEBUG` | `0` | `<level>[:<path>]` trace verbosity and destination |
//! | `EB_DEBUG_SPOOL` | `false` | Stage transaction traces in temp files |
//! | `EB_LOG_LEVEL` | `info` | Log level filter |
//! | `EB_CONSOLE_OUTPUT` | `false` | Also log to stderr via `tracing` |
//! | `EB_JSON_LOGS` | `false` | JSON console logs |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod buffer;
mod config;
mod logging;
pub mod metrics;
pub mod sink;

pub use buffer::TransactionTrace;
pub use config::{same_privilege, DebugSpec, TelemetryConfig, DEBUG_ENV};
pub use logging::{build_subscriber, init_logging, sink_level_for, TraceSinkLayer};
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, ENGINES_SPAWNED,
    MALFORMED_STATUS_LINES, OPERATIONS_COMPLETED, OPERATION_DURATION, SPAWN_FAILURES,
    STATUS_EVENTS, TRACE_BLOCKS_FLUSHED,
};
pub use sink::{MemoryLog, SinkTarget, TraceSink};

use std::sync::Arc;
use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    Metrics(String),
}

/// Initialize the trace sink, metrics and the `tracing` subscriber.
///
/// The sink is process-wide: if it was already initialized, the existing
/// one is kept and `config` only affects logging.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let sink = sink::install(config);
    let metrics = register_metrics()?;
    init_logging(config, sink.clone())?;

    tracing::info!(
        service = %config.service_name,
        level = sink.level(),
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { sink, metrics })
}

/// Keeps handles to the initialized telemetry.
pub struct TelemetryGuard {
    sink: Arc<TraceSink>,
    metrics: MetricsHandle,
}

impl TelemetryGuard {
    #[must_use]
    pub fn sink(&self) -> &Arc<TraceSink> {
        &self.sink
    }

    #[must_use]
    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::debug!("Shutting down telemetry");
    }
}
