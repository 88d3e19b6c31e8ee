//! # Error Types
//!
//! The one error a caller sees for a whole operation.

use crate::channels::ChannelRole;
use crate::results::HandlerKind;
use thiserror::Error;

/// Errors surfaced through `wait` and the operation facades.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine subprocess or one of its channels could not be created.
    #[error("Engine spawn failed: {0}")]
    EngineSpawn(String),

    /// Unparseable status stream, or the engine exited without a
    /// terminating status.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An allocation failed while accumulating results or buffering data.
    #[error("Out of resources during {stage}")]
    ResourceExhausted { stage: String },

    /// A composite operation is missing one or more handler results.
    #[error("Incomplete result: no {} result", join_kinds(.missing))]
    IncompleteResult { missing: Vec<HandlerKind> },

    /// Read or write failure on a channel, distinct from protocol issues.
    #[error("I/O error on {channel} channel: {reason}")]
    Io { channel: ChannelRole, reason: String },

    /// The engine reported that decryption failed.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// The engine found no usable data in the input.
    #[error("No data")]
    NoData,

    /// The passphrase was rejected or never supplied.
    #[error("Bad passphrase")]
    BadPassphrase,

    /// No recipients were given or usable.
    #[error("No recipients")]
    NoRecipients,

    /// Some recipients were rejected by the engine.
    #[error("Invalid recipients: {count} rejected")]
    InvalidRecipients { count: usize },

    /// The operation was released before it completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// The wait deadline expired before the operation completed.
    #[error("Timed out waiting for the engine")]
    Timeout,

    /// `wait` was called on a context with nothing started.
    #[error("No operation pending")]
    NoOperation,

    /// Two handlers of the same kind were registered on one chain.
    #[error("Handler of kind {0} registered twice")]
    DuplicateHandler(HandlerKind),
}

impl EngineError {
    /// Build an I/O error for a channel.
    pub fn io(channel: ChannelRole, err: impl std::fmt::Display) -> Self {
        Self::Io {
            channel,
            reason: err.to_string(),
        }
    }

    /// Short stable label for metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            EngineError::EngineSpawn(_) => "spawn",
            EngineError::Protocol(_) => "protocol",
            EngineError::ResourceExhausted { .. } => "resources",
            EngineError::IncompleteResult { .. } => "incomplete",
            EngineError::Io { .. } => "io",
            EngineError::DecryptionFailed => "decryption_failed",
            EngineError::NoData => "no_data",
            EngineError::BadPassphrase => "bad_passphrase",
            EngineError::NoRecipients => "no_recipients",
            EngineError::InvalidRecipients { .. } => "invalid_recipients",
            EngineError::Cancelled => "cancelled",
            EngineError::Timeout => "timeout",
            EngineError::NoOperation => "no_operation",
            EngineError::DuplicateHandler(_) => "duplicate_handler",
        }
    }
}

fn join_kinds(kinds: &[HandlerKind]) -> String {
    kinds
        .iter()
        .map(|k| k.name())
        .collect::<Vec<_>>()
        .join("/")
}
