//! # Combined Outcome
//!
//! Folds everything one operation produced into the single error or
//! success the caller sees.
//!
//! Checks run in this order; the first that fails decides the error:
//!
//! 1. a handler ran out of resources
//! 2. a channel or parser failure was recorded
//! 3. the engine rejected the passphrase, which is why later results
//!    never arrived
//! 4. a registered handler never fired
//! 5. a handler aborted the operation
//! 6. a handler's own result check (registration order)
//! 7. the status stream ended without `END_STREAM`

use shared_bus::ChainResults;
use shared_types::{EngineError, OperationOutcome, OperationResult};

/// Raw facts gathered by the pump once an operation stops.
#[derive(Debug, Default)]
pub struct Completion {
    pub chain: ChainResults,
    /// First channel or parser failure.
    pub pending_error: Option<EngineError>,
    /// `END_STREAM` arrived.
    pub saw_end: bool,
    /// Whether a missing `END_STREAM` is an error.
    pub require_end: bool,
    pub exit_code: Option<i32>,
    pub protocol_errors: u32,
}

/// Apply the combining rule.
pub fn combine(completion: Completion) -> Result<OperationOutcome, EngineError> {
    let Completion {
        chain,
        pending_error,
        saw_end,
        require_end,
        exit_code,
        protocol_errors,
    } = completion;

    if chain.out_of_resources {
        return Err(EngineError::ResourceExhausted {
            stage: "status dispatch".to_string(),
        });
    }
    if let Some(err) = pending_error {
        return Err(err);
    }
    for result in &chain.results {
        if let OperationResult::Passphrase(passphrase) = result {
            passphrase.check()?;
        }
    }
    if !chain.missing.is_empty() {
        return Err(EngineError::IncompleteResult {
            missing: chain.missing,
        });
    }
    if let Some(reason) = chain.fatal {
        return Err(EngineError::Protocol(reason));
    }
    for result in &chain.results {
        result.check()?;
    }
    if require_end && !saw_end {
        return Err(EngineError::Protocol(
            "engine exited without END_STREAM".to_string(),
        ));
    }

    let mut outcome = OperationOutcome {
        exit_code,
        protocol_errors,
        ..Default::default()
    };
    for result in chain.results {
        outcome.deposit(result);
    }
    Ok(outcome)
}
