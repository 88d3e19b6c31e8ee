//! # Status Handlers
//!
//! Defines the observer side of the dispatch chain.

use crate::filter::CodeFilter;
use shared_types::{HandlerKind, OperationResult, StatusEvent};
use thiserror::Error;
use zeroize::Zeroizing;

/// Errors a handler can raise while consuming an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler's accumulator could not grow.
    #[error("{kind} handler out of resources")]
    OutOfResources { kind: HandlerKind },

    /// The handler decided the event makes the operation unrecoverable.
    #[error("{kind} handler aborted: {reason}")]
    Fatal { kind: HandlerKind, reason: String },
}

/// What a handler did with an event.
#[derive(Debug, PartialEq, Eq)]
pub enum HandlerAction {
    /// The code is not one this handler accumulates.
    Ignored,
    /// The event updated the handler's accumulator.
    Consumed,
    /// The event was consumed and the engine expects this line back on the
    /// command channel.
    Reply(Zeroizing<String>),
}

impl HandlerAction {
    /// Whether the handler recognized the event.
    #[must_use]
    pub fn fired(&self) -> bool {
        !matches!(self, HandlerAction::Ignored)
    }
}

/// A per-operation-kind accumulator driven by status events.
///
/// Implementations keep all state private. The chain calls `handle` for
/// every event passing `interest()`, in emission order, and calls `finish`
/// once when the operation ends.
pub trait StatusHandler: Send {
    /// The slot this handler fills.
    fn kind(&self) -> HandlerKind;

    /// Codes this handler wants to see.
    fn interest(&self) -> CodeFilter {
        CodeFilter::all()
    }

    /// Whether the operation needs this handler to fire. An optional handler
    /// that never fires leaves its slot empty without failing the operation.
    fn required(&self) -> bool {
        true
    }

    /// Consume one event.
    fn handle(&mut self, event: &StatusEvent) -> Result<HandlerAction, HandlerError>;

    /// Surrender the accumulated result.
    fn finish(self: Box<Self>) -> OperationResult;
}

/// Grow `vec` by one element, reporting allocation failure instead of
/// aborting.
pub fn try_push<T>(vec: &mut Vec<T>, value: T, kind: HandlerKind) -> Result<(), HandlerError> {
    vec.try_reserve(1)
        .map_err(|_| HandlerError::OutOfResources { kind })?;
    vec.push(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_fired() {
        assert!(!HandlerAction::Ignored.fired());
        assert!(HandlerAction::Consumed.fired());
        assert!(HandlerAction::Reply(Zeroizing::new("x".into())).fired());
    }

    #[test]
    fn test_try_push() {
        let mut v = Vec::new();
        try_push(&mut v, 1u8, HandlerKind::Sign).unwrap();
        assert_eq!(v, vec![1]);
    }

    #[test]
    fn test_error_display() {
        let err = HandlerError::OutOfResources {
            kind: HandlerKind::Verify,
        };
        assert_eq!(err.to_string(), "verify handler out of resources");
    }
}
