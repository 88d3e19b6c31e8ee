//! Diagnostic trace sink.
//!
//! One lock-protected destination with a verbosity threshold. Every write
//! (a single message, or a whole transaction block) happens under the lock,
//! so output from concurrent threads never interleaves within a line or a
//! block. The sink is the failure-reporting path, so it never fails loudly:
//! write errors are dropped.

use crate::config::{DebugSpec, TelemetryConfig};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// In-memory destination, shareable so a test can read what was written.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog(Arc<Mutex<Vec<u8>>>);

impl MemoryLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Written output split into lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

/// Where sink output goes.
#[derive(Debug)]
pub enum SinkTarget {
    Stderr,
    File(File),
    Memory(MemoryLog),
}

impl SinkTarget {
    /// Open `path` for append, falling back to stderr.
    fn open_or_stderr(path: Option<&PathBuf>) -> Self {
        let Some(path) = path else {
            return SinkTarget::Stderr;
        };
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => SinkTarget::File(file),
            Err(_) => SinkTarget::Stderr,
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            SinkTarget::Stderr => io::stderr().lock().write_all(bytes),
            SinkTarget::File(file) => file.write_all(bytes),
            SinkTarget::Memory(log) => {
                log.0.lock().extend_from_slice(bytes);
                Ok(())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SinkTarget::Stderr => io::stderr().lock().flush(),
            SinkTarget::File(file) => file.flush(),
            SinkTarget::Memory(_) => Ok(()),
        }
    }
}

/// Lock-protected trace destination with a fixed verbosity.
#[derive(Debug)]
pub struct TraceSink {
    level: u32,
    spool: bool,
    spool_dir: Option<PathBuf>,
    target: Mutex<SinkTarget>,
}

impl TraceSink {
    /// Build a sink from an explicit target.
    #[must_use]
    pub fn new(level: u32, target: SinkTarget) -> Self {
        Self {
            level,
            spool: false,
            spool_dir: None,
            target: Mutex::new(target),
        }
    }

    /// Build a sink writing to memory; returns the sink and a reader handle.
    #[must_use]
    pub fn in_memory(level: u32) -> (Arc<Self>, MemoryLog) {
        let log = MemoryLog::new();
        (
            Arc::new(Self::new(level, SinkTarget::Memory(log.clone()))),
            log,
        )
    }

    /// Build a sink from the debug spec: the configured file when it can be
    /// opened for append, stderr otherwise.
    #[must_use]
    pub fn from_spec(spec: &DebugSpec) -> Self {
        Self::new(spec.level, SinkTarget::open_or_stderr(spec.file.as_ref()))
    }

    /// Build a sink from the full telemetry configuration.
    #[must_use]
    pub fn from_config(config: &TelemetryConfig) -> Self {
        let mut sink = Self::from_spec(&config.debug);
        sink.spool = config.spool_traces;
        sink.spool_dir = config.spool_dir.clone();
        sink
    }

    /// Stage transaction traces from this sink in spool files.
    #[must_use]
    pub fn with_spool(mut self, dir: Option<PathBuf>) -> Self {
        self.spool = true;
        self.spool_dir = dir;
        self
    }

    /// Current verbosity; 0 means disabled.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Whether a message at `min_level` would be written.
    #[must_use]
    pub fn enabled(&self, min_level: u32) -> bool {
        self.level >= min_level
    }

    pub(crate) fn spool(&self) -> Option<Option<&PathBuf>> {
        self.spool.then_some(self.spool_dir.as_ref())
    }

    /// Write one message if the verbosity allows it, adding a newline when
    /// the message lacks one, and flush.
    pub fn emit(&self, min_level: u32, message: &str) {
        if !self.enabled(min_level) {
            return;
        }
        let mut target = self.target.lock();
        let _ = target.write_all(message.as_bytes());
        if !message.ends_with('\n') {
            let _ = target.write_all(b"\n");
        }
        let _ = target.flush();
    }

    /// Write a whole block under one lock acquisition, ensuring it ends with
    /// a newline. Used to publish a finished transaction trace.
    pub fn publish_block(&self, block: &[u8]) {
        let mut target = self.target.lock();
        let _ = target.write_all(block);
        if block.last() != Some(&b'\n') {
            let _ = target.write_all(b"\n");
        }
        let _ = target.flush();
    }
}

// =============================================================================
// PROCESS-WIDE SINK
// =============================================================================

static GLOBAL_SINK: OnceLock<Arc<TraceSink>> = OnceLock::new();

/// Install the process-wide sink from `config` unless one already exists.
/// Returns the sink that is in effect.
pub fn install(config: &TelemetryConfig) -> Arc<TraceSink> {
    GLOBAL_SINK
        .get_or_init(|| announce(TraceSink::from_config(config)))
        .clone()
}

/// Idempotent lazy initialization from the environment.
pub fn initialize() -> Arc<TraceSink> {
    GLOBAL_SINK
        .get_or_init(|| announce(TraceSink::from_config(&TelemetryConfig::from_env())))
        .clone()
}

/// The process-wide sink.
pub fn global() -> Arc<TraceSink> {
    initialize()
}

/// Verbosity of the process-wide sink.
pub fn level() -> u32 {
    global().level()
}

/// Emit through the process-wide sink.
pub fn emit(min_level: u32, message: &str) {
    global().emit(min_level, message);
}

fn announce(sink: TraceSink) -> Arc<TraceSink> {
    if sink.level() > 0 {
        sink.emit(1, &format!("engine_debug: level={}", sink.level()));
    }
    Arc::new(sink)
}
