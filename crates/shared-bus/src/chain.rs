//! # Handler Chain
//!
//! Ordered observer list that every status event of one operation is
//! dispatched through.

use crate::handler::{HandlerAction, HandlerError, StatusHandler};
use crate::MAX_CHAIN_LEN;
use shared_types::{EngineError, HandlerKind, OperationResult, StatusEvent};
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// One registered handler plus the chain's bookkeeping about it.
struct Entry {
    handler: Box<dyn StatusHandler>,
    fired: bool,
}

/// What happened to one dispatched event.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of handlers that recognized the event.
    pub consumed_by: usize,
    /// Lines to send back on the command channel, in handler order.
    pub replies: Vec<Zeroizing<String>>,
}

/// Everything the chain hands back when the operation ends.
#[derive(Debug, Default)]
pub struct ChainResults {
    /// Results of handlers that recognized at least one event.
    pub results: Vec<OperationResult>,
    /// Kinds whose required handler never fired.
    pub missing: Vec<HandlerKind>,
    /// Some handler failed to grow its accumulator.
    pub out_of_resources: bool,
    /// First fatal verdict raised by a handler.
    pub fatal: Option<String>,
}

/// Ordered chain of status handlers for one operation.
#[derive(Default)]
pub struct HandlerChain {
    entries: Vec<Entry>,
    out_of_resources: bool,
    fatal: Option<String>,
    dispatched: u64,
}

impl HandlerChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler. Each kind may appear once, since each kind owns
    /// exactly one result slot.
    pub fn register(&mut self, handler: Box<dyn StatusHandler>) -> Result<(), EngineError> {
        let kind = handler.kind();
        if self.entries.iter().any(|e| e.handler.kind() == kind) {
            return Err(EngineError::DuplicateHandler(kind));
        }
        if self.entries.len() >= MAX_CHAIN_LEN {
            return Err(EngineError::ResourceExhausted {
                stage: "handler registration".to_string(),
            });
        }
        debug!(kind = %kind, position = self.entries.len(), "Handler registered");
        self.entries.push(Entry {
            handler,
            fired: false,
        });
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, handler: Box<dyn StatusHandler>) -> Result<Self, EngineError> {
        self.register(handler)?;
        Ok(self)
    }

    /// Registered kinds, in registration order.
    #[must_use]
    pub fn kinds(&self) -> Vec<HandlerKind> {
        self.entries.iter().map(|e| e.handler.kind()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any handler has reported an allocation failure.
    #[must_use]
    pub fn out_of_resources(&self) -> bool {
        self.out_of_resources
    }

    /// Total events dispatched so far.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Deliver one event to every interested handler, in order.
    ///
    /// Handler errors never stop the traversal: later handlers still see the
    /// event. They are recorded on the chain and surface in `finish`.
    pub fn dispatch(&mut self, event: &StatusEvent) -> DispatchReport {
        self.dispatched += 1;
        let mut report = DispatchReport::default();

        for entry in &mut self.entries {
            if !entry.handler.interest().matches(&event.code) {
                continue;
            }
            match entry.handler.handle(event) {
                Ok(action) => {
                    if action.fired() {
                        entry.fired = true;
                        report.consumed_by += 1;
                    }
                    if let HandlerAction::Reply(line) = action {
                        report.replies.push(line);
                    }
                }
                Err(HandlerError::OutOfResources { kind }) => {
                    warn!(kind = %kind, code = %event.code, "Handler out of resources");
                    entry.fired = true;
                    self.out_of_resources = true;
                }
                Err(err @ HandlerError::Fatal { .. }) => {
                    warn!(error = %err, code = %event.code, "Handler aborted operation");
                    entry.fired = true;
                    if self.fatal.is_none() {
                        self.fatal = Some(err.to_string());
                    }
                }
            }
        }

        report
    }

    /// End the operation and collect every handler's result.
    pub fn finish(self) -> ChainResults {
        let mut out = ChainResults {
            out_of_resources: self.out_of_resources,
            fatal: self.fatal,
            ..Default::default()
        };
        for entry in self.entries {
            let kind = entry.handler.kind();
            if entry.fired {
                out.results.push(entry.handler.finish());
            } else if entry.handler.required() {
                out.missing.push(kind);
            }
        }
        out
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerChain")
            .field("kinds", &self.kinds())
            .field("out_of_resources", &self.out_of_resources)
            .field("dispatched", &self.dispatched)
            .finish()
    }
}
