//! Application logging.
//!
//! `tracing` is the ambient log. Besides the optional console layer, every
//! event is also forwarded into the diagnostic [`TraceSink`] at a verbosity
//! derived from its level, so `EB_DEBUG` alone is enough to see what the
//! library is doing:
//!
//! | tracing level | sink verbosity |
//! |---------------|----------------|
//! | ERROR, WARN   | 1              |
//! | INFO          | 2              |
//! | DEBUG         | 3              |
//! | TRACE         | 4              |

use crate::sink::TraceSink;
use crate::{TelemetryConfig, TelemetryError};
use std::fmt::{self, Write as _};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Sink verbosity at which events of `level` are written.
#[must_use]
pub fn sink_level_for(level: &Level) -> u32 {
    match *level {
        Level::ERROR | Level::WARN => 1,
        Level::INFO => 2,
        Level::DEBUG => 3,
        Level::TRACE => 4,
    }
}

/// Layer forwarding `tracing` events into a [`TraceSink`].
pub struct TraceSinkLayer {
    sink: Arc<TraceSink>,
}

impl TraceSinkLayer {
    #[must_use]
    pub fn new(sink: Arc<TraceSink>) -> Self {
        Self { sink }
    }
}

/// Renders `message` first, then `key=value` pairs.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl<S: Subscriber> Layer<S> for TraceSinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let min_level = sink_level_for(meta.level());
        if !self.sink.enabled(min_level) {
            return;
        }
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        self.sink.emit(
            min_level,
            &format!(
                "{} {}: {}{}",
                meta.level(),
                meta.target(),
                visitor.message,
                visitor.fields
            ),
        );
    }
}

/// Console output layer, boxed so the plain and JSON forms share a type.
type ConsoleLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// The stderr layer, filtered by `log_level`. `None` when console output
/// is off.
fn console_layer(config: &TelemetryConfig) -> Result<Option<ConsoleLayer>, TelemetryError> {
    if !config.console_output {
        return Ok(None);
    }
    let env_filter = EnvFilter::try_new(&config.log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .map_err(|e| TelemetryError::Logging(e.to_string()))?;

    let layer: ConsoleLayer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed()
    };
    Ok(Some(layer))
}

/// Build the subscriber without installing it.
///
/// `log_level` filters the console only. The sink layer sees every event
/// and applies the sink's own verbosity.
pub fn build_subscriber(
    config: &TelemetryConfig,
    sink: Arc<TraceSink>,
) -> Result<impl Subscriber + Send + Sync + 'static, TelemetryError> {
    Ok(tracing_subscriber::registry()
        .with(console_layer(config)?)
        .with(TraceSinkLayer::new(sink)))
}

/// Install the global `tracing` subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(
    config: &TelemetryConfig,
    sink: Arc<TraceSink>,
) -> Result<(), TelemetryError> {
    build_subscriber(config, sink)?
        .try_init()
        .map_err(|e| TelemetryError::Logging(e.to_string()))
}
