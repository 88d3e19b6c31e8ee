//! Transaction trace buffers.
//!
//! A transaction stages its trace lines privately and publishes them into
//! the [`TraceSink`] in one locked write when it ends. Until then nothing
//! reaches the sink, so concurrent transactions never interleave.

use crate::metrics::TRACE_BLOCKS_FLUSHED;
use crate::sink::TraceSink;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Backing store of an active trace.
enum TraceStore {
    Memory(Vec<u8>),
    Spool(NamedTempFile),
}

impl TraceStore {
    fn spool(dir: Option<&PathBuf>, id: u64) -> io::Result<Self> {
        let name = format!("eb_trace.{}.{}", std::process::id(), id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&name).rand_bytes(0);
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(TraceStore::Spool(file))
    }

    fn write_line(&mut self, text: &str) -> io::Result<()> {
        let newline = !text.ends_with('\n');
        match self {
            TraceStore::Memory(buf) => {
                buf.try_reserve(text.len() + usize::from(newline))
                    .map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
                buf.extend_from_slice(text.as_bytes());
                if newline {
                    buf.push(b'\n');
                }
                Ok(())
            }
            TraceStore::Spool(file) => {
                let f: &mut File = file.as_file_mut();
                f.write_all(text.as_bytes())?;
                if newline {
                    f.write_all(b"\n")?;
                }
                Ok(())
            }
        }
    }

    /// Rewind and read everything staged so far.
    fn contents(&mut self) -> io::Result<Vec<u8>> {
        match self {
            TraceStore::Memory(buf) => Ok(std::mem::take(buf)),
            TraceStore::Spool(file) => {
                let f = file.as_file_mut();
                f.seek(SeekFrom::Start(0))?;
                let mut out = Vec::new();
                f.read_to_end(&mut out)?;
                Ok(out)
            }
        }
    }

    fn path(&self) -> Option<&Path> {
        match self {
            TraceStore::Memory(_) => None,
            TraceStore::Spool(file) => Some(file.path()),
        }
    }
}

/// State of an enabled trace.
pub struct ActiveTrace {
    id: u64,
    sink: Arc<TraceSink>,
    store: TraceStore,
}

/// Handle for one transaction's trace.
///
/// `Disabled` is a regular value: every operation on it is a no-op. An
/// active trace that is dropped without [`end`](Self::end) is discarded,
/// removing any spool file.
#[derive(Default)]
pub enum TransactionTrace {
    #[default]
    Disabled,
    Active(Box<ActiveTrace>),
}

impl TransactionTrace {
    /// Start a trace if `sink` is at least as verbose as `min_level`.
    ///
    /// If the private store cannot be created the trace is disabled and the
    /// failure is reported once through the sink.
    pub fn begin(sink: &Arc<TraceSink>, min_level: u32, begin_text: &str) -> Self {
        if !sink.enabled(min_level) {
            return TransactionTrace::Disabled;
        }
        let id = NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed);

        let store = match sink.spool() {
            Some(dir) => TraceStore::spool(dir, id),
            None => Ok(TraceStore::Memory(Vec::new())),
        };
        let mut store = match store {
            Ok(store) => store,
            Err(err) => {
                sink.emit(1, &format!("engine_debug: trace buffer {id} disabled: {err}"));
                return TransactionTrace::Disabled;
            }
        };
        if let Err(err) = store.write_line(begin_text) {
            sink.emit(1, &format!("engine_debug: trace buffer {id} disabled: {err}"));
            return TransactionTrace::Disabled;
        }

        TransactionTrace::Active(Box::new(ActiveTrace {
            id,
            sink: sink.clone(),
            store,
        }))
    }

    /// Start a trace against the process-wide sink.
    pub fn begin_global(min_level: u32, begin_text: &str) -> Self {
        Self::begin(&crate::sink::global(), min_level, begin_text)
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        matches!(self, TransactionTrace::Active(_))
    }

    /// Stage one line. Never touches the sink.
    pub fn append(&mut self, text: &str) {
        let TransactionTrace::Active(active) = self else {
            return;
        };
        if let Err(err) = active.store.write_line(text) {
            active.sink.emit(
                1,
                &format!("engine_debug: trace buffer {} dropped: {err}", active.id),
            );
            *self = TransactionTrace::Disabled;
        }
    }

    /// Stage one formatted line; formatting is skipped when disabled.
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) {
        if self.enabled() {
            self.append(&args.to_string());
        }
    }

    /// Append `end_text` and publish the whole trace as one block.
    /// Invalidates the handle; a second call does nothing.
    pub fn end(&mut self, end_text: &str) {
        let TransactionTrace::Active(mut active) = std::mem::take(self) else {
            return;
        };
        let staged = active
            .store
            .write_line(end_text)
            .and_then(|()| active.store.contents());
        match staged {
            Ok(block) => {
                active.sink.publish_block(&block);
                TRACE_BLOCKS_FLUSHED.inc();
            }
            Err(err) => active.sink.emit(
                1,
                &format!("engine_debug: trace buffer {} lost: {err}", active.id),
            ),
        }
    }

    /// Path of the spool file, if this trace is spooled.
    #[must_use]
    pub fn spool_path(&self) -> Option<PathBuf> {
        match self {
            TransactionTrace::Active(active) => active.store.path().map(Path::to_path_buf),
            TransactionTrace::Disabled => None,
        }
    }
}

impl fmt::Debug for TransactionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionTrace::Disabled => f.write_str("TransactionTrace::Disabled"),
            TransactionTrace::Active(active) => f
                .debug_struct("TransactionTrace::Active")
                .field("id", &active.id)
                .field("spool", &active.store.path())
                .finish(),
        }
    }
}

/// Stage a formatted line in a [`TransactionTrace`].
#[macro_export]
macro_rules! trace_add {
    ($trace:expr, $($arg:tt)*) => {
        $trace.append_fmt(format_args!($($arg)*))
    };
}
