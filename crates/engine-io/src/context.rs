//! # Operation Context
//!
//! One in-flight engine operation: the channel set, the handler chain and
//! the pump task moving bytes between them.
//!
//! ```text
//!   caller input ──copy──→ data-in ──→ ┌────────┐ ──→ data-out ──copy──→ caller output
//!                                      │ engine │
//!   handler replies ──→ command ─────→ └────────┘ ──→ status ──parse──→ HandlerChain
//!                                                  ──→ diagnostics ──→ trace
//! ```
//!
//! `start` returns as soon as the engine is running. `wait` collects the
//! combined outcome; `release` cancels, kills and reaps.

use crate::adapters::channels::{BoxReader, BoxWriter, ChannelSet, Streams};
use crate::config::EngineConfig;
use crate::domain::outcome::{combine, Completion};
use crate::domain::status::StatusLineParser;
use crate::ports::outbound::{EngineLauncher, LaunchRequest};
use engine_telemetry::{
    trace_add, HistogramTimer, TraceSink, TransactionTrace, MALFORMED_STATUS_LINES,
    OPERATIONS_COMPLETED, OPERATION_DURATION, STATUS_EVENTS,
};
use shared_bus::HandlerChain;
use shared_types::{
    ChannelRole, ChannelRoles, ContextId, EngineError, OperationOutcome, Protocol, StatusCode,
    StatusEvent,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const STATUS_READ_CHUNK: usize = 4096;
const DIAGNOSTICS_READ_CHUNK: usize = 1024;

/// Everything one operation needs besides the context itself.
pub struct OperationRequest {
    /// Short operation name for logs and traces.
    pub name: &'static str,
    pub args: Vec<String>,
    pub roles: ChannelRoles,
    pub chain: HandlerChain,
    pub input: Option<BoxReader>,
    pub output: Option<BoxWriter>,
}

impl OperationRequest {
    pub fn new(name: &'static str, chain: HandlerChain) -> Self {
        Self {
            name,
            args: Vec::new(),
            roles: ChannelRoles::data(),
            chain,
            input: None,
            output: None,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_roles(mut self, roles: ChannelRoles) -> Self {
        self.roles = roles;
        self
    }

    #[must_use]
    pub fn with_input(mut self, input: BoxReader) -> Self {
        self.input = Some(input);
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: BoxWriter) -> Self {
        self.output = Some(output);
        self
    }
}

impl std::fmt::Debug for OperationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRequest")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("roles", &self.roles)
            .field("chain", &self.chain)
            .finish()
    }
}

/// How a pump task ended, as seen by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Finished {
    Done(ContextId),
    Cancelled(ContextId),
}

/// Completion channel shared by the contexts of one session.
#[derive(Debug, Clone)]
pub(crate) struct Notifier {
    pub(crate) tx: mpsc::UnboundedSender<Finished>,
    pub(crate) pending: Arc<AtomicUsize>,
}

impl Notifier {
    fn finished(&self, message: Finished) {
        let _ = self.tx.send(message);
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One operation counted as pending on a session. Dropping it reports the
/// operation finished, so a pump task that panics still settles the count.
struct PendingSlot {
    notifier: Notifier,
    message: Finished,
}

impl PendingSlot {
    fn new(notifier: Notifier, id: ContextId) -> Self {
        notifier.pending.fetch_add(1, Ordering::SeqCst);
        Self {
            notifier,
            message: Finished::Done(id),
        }
    }

    fn cancelled(&mut self) {
        if let Finished::Done(id) = self.message {
            self.message = Finished::Cancelled(id);
        }
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.notifier.finished(self.message);
    }
}

struct PendingOp {
    handle: JoinHandle<Result<OperationOutcome, EngineError>>,
    cancel: oneshot::Sender<()>,
    pid: Option<u32>,
    name: &'static str,
    started: Instant,
}

/// A reusable context running one operation at a time.
pub struct OperationContext {
    id: ContextId,
    protocol: Protocol,
    launcher: Arc<dyn EngineLauncher>,
    config: EngineConfig,
    sink: Arc<TraceSink>,
    pending: Option<PendingOp>,
    notifier: Option<Notifier>,
}

impl OperationContext {
    pub fn new(
        protocol: Protocol,
        launcher: Arc<dyn EngineLauncher>,
        config: EngineConfig,
        sink: Arc<TraceSink>,
    ) -> Self {
        Self {
            id: ContextId::new(),
            protocol,
            launcher,
            config,
            sink,
            pending: None,
            notifier: None,
        }
    }

    pub(crate) fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[must_use]
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Engine process id of the pending operation, if it is a subprocess.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pending.as_ref().and_then(|op| op.pid)
    }

    /// Launch the engine and start pumping. Returns once the engine runs.
    ///
    /// An operation still pending on this context is released first.
    ///
    /// # Errors
    /// * `EngineError::EngineSpawn` - the launcher could not start the engine
    pub async fn start(&mut self, request: OperationRequest) -> Result<(), EngineError> {
        if self.pending.is_some() {
            debug!(context_id = %self.id.short(), "Releasing previous operation");
            self.release().await;
        }

        let OperationRequest {
            name,
            args,
            roles,
            chain,
            input,
            output,
        } = request;

        let launch = LaunchRequest::new(self.protocol, roles, args);
        let mut set = self.launcher.launch(&launch).await.map_err(|err| {
            warn!(context_id = %self.id.short(), op = name, error = %err, "Operation failed to start");
            err
        })?;
        let pid = set.pid();
        let streams = set.take_streams();

        let trace = TransactionTrace::begin(
            &self.sink,
            self.config.trace_level,
            &format!(
                "{name}: context={} protocol={} pid={pid:?} args={:?} handlers={:?}",
                self.id.short(),
                self.protocol,
                launch.args,
                chain.kinds()
            ),
        );

        let pump = Pump {
            context: self.id,
            name,
            set,
            chain,
            parser: StatusLineParser::new(),
            trace,
            command: None,
            pending_error: None,
            saw_end: false,
            require_end: self.config.require_end_stream,
            protocol_errors: 0,
        };

        let (cancel, cancelled) = oneshot::channel();
        let mut slot = self
            .notifier
            .clone()
            .map(|notifier| PendingSlot::new(notifier, self.id));
        let handle = tokio::spawn(async move {
            let result = pump.run(streams, input, output, cancelled).await;
            if let (Some(slot), Err(EngineError::Cancelled)) = (slot.as_mut(), &result) {
                slot.cancelled();
            }
            drop(slot);
            result
        });

        info!(context_id = %self.id.short(), op = name, pid = ?pid, "Operation started");
        self.pending = Some(PendingOp {
            handle,
            cancel,
            pid,
            name,
            started: Instant::now(),
        });
        Ok(())
    }

    /// Collect the pending operation's combined outcome.
    ///
    /// With `block == false` this returns `Ok(None)` while the operation is
    /// still running. Once an outcome (or error) is returned the context is
    /// idle again.
    ///
    /// # Errors
    /// * `EngineError::NoOperation` - nothing was started
    /// * any error from the combining rule
    pub async fn wait(&mut self, block: bool) -> Result<Option<OperationOutcome>, EngineError> {
        let Some(op) = self.pending.as_mut() else {
            return Err(EngineError::NoOperation);
        };
        if !block && !op.handle.is_finished() {
            return Ok(None);
        }
        let joined = (&mut op.handle).await;
        self.complete(joined).map(Some)
    }

    /// Blocking wait bounded by `timeout`. On timeout the operation stays
    /// pending and can be waited for again or released.
    ///
    /// # Errors
    /// * `EngineError::Timeout` - the operation did not finish in time
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Result<OperationOutcome, EngineError> {
        let Some(op) = self.pending.as_mut() else {
            return Err(EngineError::NoOperation);
        };
        match tokio::time::timeout(timeout, &mut op.handle).await {
            Ok(joined) => self.complete(joined),
            Err(_) => Err(EngineError::Timeout),
        }
    }

    /// Start `request` and block until it completes.
    pub async fn run(&mut self, request: OperationRequest) -> Result<OperationOutcome, EngineError> {
        self.start(request).await?;
        self.wait(true).await?.ok_or(EngineError::NoOperation)
    }

    /// Cancel the pending operation: the engine is killed and reaped, handler
    /// state and any staged trace are discarded.
    pub async fn release(&mut self) {
        let Some(op) = self.pending.take() else {
            return;
        };
        let _ = op.cancel.send(());
        let _ = op.handle.await;
        debug!(context_id = %self.id.short(), op = op.name, "Operation released");
    }

    fn complete(
        &mut self,
        joined: Result<Result<OperationOutcome, EngineError>, tokio::task::JoinError>,
    ) -> Result<OperationOutcome, EngineError> {
        let op = self.pending.take();
        let result = match joined {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(EngineError::Cancelled),
            Err(err) => Err(EngineError::Protocol(format!("operation task failed: {err}"))),
        };
        if let Some(op) = op {
            debug!(
                context_id = %self.id.short(),
                op = op.name,
                elapsed_ms = op.started.elapsed().as_millis() as u64,
                ok = result.is_ok(),
                "Operation collected"
            );
        }
        result
    }
}

impl std::fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext")
            .field("id", &self.id)
            .field("protocol", &self.protocol)
            .field("pending", &self.pending.as_ref().map(|op| op.name))
            .finish()
    }
}

// =============================================================================
// PUMP
// =============================================================================

/// State owned by the pump task of one operation.
struct Pump {
    context: ContextId,
    name: &'static str,
    set: ChannelSet,
    chain: HandlerChain,
    parser: StatusLineParser,
    trace: TransactionTrace,
    command: Option<BoxWriter>,
    pending_error: Option<EngineError>,
    saw_end: bool,
    require_end: bool,
    protocol_errors: u32,
}

async fn read_some(reader: &mut Option<BoxReader>, buf: &mut [u8]) -> std::io::Result<usize> {
    match reader {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Copy the caller's input into the engine, then close data-in.
async fn feed_input(input: Option<BoxReader>, data_in: Option<BoxWriter>) -> Result<u64, EngineError> {
    let (Some(mut input), Some(mut data_in)) = (input, data_in) else {
        return Ok(0);
    };
    match tokio::io::copy(&mut input, &mut data_in).await {
        Ok(copied) => {
            let _ = data_in.shutdown().await;
            Ok(copied)
        }
        // The engine stopped reading; whatever it decided shows up on status.
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(0),
        Err(err) => Err(EngineError::io(ChannelRole::DataIn, err)),
    }
}

/// Copy engine output to the caller. Output is drained even without a
/// destination so the engine never blocks on a full pipe.
async fn drain_output(data_out: Option<BoxReader>, output: Option<BoxWriter>) -> Result<u64, EngineError> {
    let Some(mut data_out) = data_out else {
        return Ok(0);
    };
    let io_err = |err: std::io::Error| EngineError::io(ChannelRole::DataOut, err);
    match output {
        Some(mut output) => {
            let copied = tokio::io::copy(&mut data_out, &mut output)
                .await
                .map_err(io_err)?;
            output.flush().await.map_err(io_err)?;
            Ok(copied)
        }
        None => tokio::io::copy(&mut data_out, &mut tokio::io::sink())
            .await
            .map_err(io_err),
    }
}

impl Pump {
    async fn run(
        mut self,
        streams: Streams,
        input: Option<BoxReader>,
        output: Option<BoxWriter>,
        mut cancelled: oneshot::Receiver<()>,
    ) -> Result<OperationOutcome, EngineError> {
        let _timer = HistogramTimer::new(&OPERATION_DURATION);
        let Streams {
            data_in,
            data_out,
            mut status,
            mut diagnostics,
            command,
        } = streams;
        self.command = command;

        let mut copy_in = Box::pin(feed_input(input, data_in));
        let mut copy_out = Box::pin(drain_output(data_out, output));
        let mut input_done = false;
        let mut output_done = false;
        let mut status_buf = vec![0u8; STATUS_READ_CHUNK];
        let mut diagnostics_buf = vec![0u8; DIAGNOSTICS_READ_CHUNK];

        loop {
            if status.is_none() && output_done && input_done {
                break;
            }
            if self.pending_error.is_some() || self.chain.out_of_resources() {
                self.set.kill();
                break;
            }

            tokio::select! {
                biased;

                _ = &mut cancelled => {
                    return self.abort().await;
                }

                read = read_some(&mut status, &mut status_buf), if status.is_some() => {
                    match read {
                        Ok(0) => {
                            if let Some(event) = self.parser.finish() {
                                self.deliver(event).await;
                            }
                            status = None;
                            self.set.close_on_eof(ChannelRole::Status);
                        }
                        Ok(n) => match self.parser.feed(&status_buf[..n]) {
                            Ok(events) => {
                                for event in events {
                                    self.deliver(event).await;
                                    if self.saw_end {
                                        break;
                                    }
                                }
                                if self.saw_end {
                                    status = None;
                                    self.set.close_on_eof(ChannelRole::Status);
                                }
                            }
                            Err(err) => self.fail(err),
                        },
                        Err(err) => {
                            self.fail(EngineError::io(ChannelRole::Status, err));
                            status = None;
                        }
                    }
                }

                copied = &mut copy_out, if !output_done => {
                    output_done = true;
                    self.set.close_on_eof(ChannelRole::DataOut);
                    match copied {
                        Ok(bytes) => trace_add!(self.trace, "data-out: {bytes} bytes"),
                        Err(err) => self.fail(err),
                    }
                }

                copied = &mut copy_in, if !input_done => {
                    input_done = true;
                    self.set.close_on_eof(ChannelRole::DataIn);
                    match copied {
                        Ok(bytes) => trace_add!(self.trace, "data-in: {bytes} bytes"),
                        Err(err) => self.fail(err),
                    }
                }

                read = read_some(&mut diagnostics, &mut diagnostics_buf), if diagnostics.is_some() => {
                    match read {
                        Ok(n) if n > 0 => {
                            for line in String::from_utf8_lossy(&diagnostics_buf[..n]).lines() {
                                trace_add!(self.trace, "stderr: {line}");
                            }
                        }
                        _ => {
                            diagnostics = None;
                            self.set.close_on_eof(ChannelRole::Diagnostics);
                        }
                    }
                }
            }
        }

        drop(copy_in);
        drop(copy_out);
        drop(status);
        drop(diagnostics);
        self.command = None;

        let exit_code = tokio::select! {
            code = self.set.reap() => code,
            _ = &mut cancelled => return self.abort().await,
        };
        self.finish(exit_code)
    }

    /// Parse-level bookkeeping, then hand the event to the chain and send
    /// any replies back to the engine.
    async fn deliver(&mut self, event: StatusEvent) {
        let label = match &event.code {
            StatusCode::Unknown(_) => "UNKNOWN",
            code => code.keyword(),
        };
        STATUS_EVENTS.with_label_values(&[label]).inc();
        if event.is_protocol_error() {
            self.protocol_errors += 1;
            MALFORMED_STATUS_LINES.inc();
            warn!(context_id = %self.context.short(), line = %event.args, "Malformed status line");
        }
        trace_add!(self.trace, "status: {event}");
        if event.code.is_terminal() {
            self.saw_end = true;
        }

        let report = self.chain.dispatch(&event);
        if event.code.is_prompt() && report.replies.is_empty() && self.command.is_some() {
            // The engine is blocked on the command channel; nothing will
            // ever answer it.
            self.fail(EngineError::Protocol(format!(
                "no handler answered prompt {event}"
            )));
            return;
        }
        for reply in report.replies {
            self.reply(reply).await;
        }
    }

    async fn reply(&mut self, line: Zeroizing<String>) {
        let Some(command) = self.command.as_mut() else {
            self.fail(EngineError::io(
                ChannelRole::Command,
                "engine prompted but no command channel is open",
            ));
            return;
        };
        let written = async {
            command.write_all(line.as_bytes()).await?;
            command.flush().await
        }
        .await;
        match written {
            Ok(()) => trace_add!(self.trace, "command: <{} bytes>", line.len()),
            Err(err) => {
                self.command = None;
                self.fail(EngineError::io(ChannelRole::Command, err));
            }
        }
    }

    /// Record the first channel or parser failure.
    fn fail(&mut self, err: EngineError) {
        debug!(context_id = %self.context.short(), error = %err, "Operation failing");
        trace_add!(self.trace, "error: {err}");
        if self.pending_error.is_none() {
            self.pending_error = Some(err);
        }
    }

    fn finish(mut self, exit_code: Option<i32>) -> Result<OperationOutcome, EngineError> {
        let completion = Completion {
            chain: std::mem::take(&mut self.chain).finish(),
            pending_error: self.pending_error.take(),
            saw_end: self.saw_end,
            require_end: self.require_end,
            exit_code,
            protocol_errors: self.protocol_errors,
        };
        let result = combine(completion);

        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.label(),
        };
        OPERATIONS_COMPLETED.with_label_values(&[outcome]).inc();
        match &result {
            Ok(_) => info!(
                context_id = %self.context.short(),
                op = self.name,
                exit_code = ?exit_code,
                "Operation completed"
            ),
            Err(err) => info!(
                context_id = %self.context.short(),
                op = self.name,
                exit_code = ?exit_code,
                error = %err,
                "Operation failed"
            ),
        }
        self.trace.end(&format!(
            "{}: done exit={exit_code:?} result={outcome}",
            self.name
        ));
        result
    }

    async fn abort(mut self) -> Result<OperationOutcome, EngineError> {
        self.set.kill();
        let exit_code = self.set.reap().await;
        // Dropping the staged trace removes any spool file unpublished.
        self.trace = TransactionTrace::Disabled;
        OPERATIONS_COMPLETED
            .with_label_values(&[EngineError::Cancelled.label()])
            .inc();
        info!(
            context_id = %self.context.short(),
            op = self.name,
            exit_code = ?exit_code,
            "Operation cancelled"
        );
        Err(EngineError::Cancelled)
    }
}
