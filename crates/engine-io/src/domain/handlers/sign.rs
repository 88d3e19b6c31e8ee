//! Signing handler.

use shared_bus::handler::try_push;
use shared_bus::{CodeFilter, HandlerAction, HandlerError, StatusHandler};
use shared_types::{
    HandlerKind, NewSignature, OperationResult, SigMode, SignResult, StatusCode, StatusEvent,
};

/// Accumulates a [`SignResult`].
#[derive(Debug, Default)]
pub struct SignHandler {
    result: SignResult,
}

impl SignHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Parse `SIG_CREATED <type> <pk_algo> <hash_algo> <class> <timestamp> <fpr>`.
fn parse_sig_created(event: &StatusEvent) -> Option<NewSignature> {
    let mode = match event.arg(0)? {
        "D" => SigMode::Detached,
        "C" => SigMode::Clear,
        "S" => SigMode::Normal,
        _ => return None,
    };
    Some(NewSignature {
        mode,
        pubkey_algo: event.arg(1)?.parse().ok()?,
        hash_algo: event.arg(2)?.parse().ok()?,
        sig_class: u32::from_str_radix(event.arg(3)?, 16).ok()?,
        timestamp: event.arg(4)?.parse().ok()?,
        fingerprint: event.arg(5)?.to_string(),
    })
}

impl StatusHandler for SignHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Sign
    }

    fn interest(&self) -> CodeFilter {
        CodeFilter::codes(vec![StatusCode::SigCreated])
    }

    fn handle(&mut self, event: &StatusEvent) -> Result<HandlerAction, HandlerError> {
        if event.code != StatusCode::SigCreated {
            return Ok(HandlerAction::Ignored);
        }
        let sig = parse_sig_created(event).ok_or_else(|| HandlerError::Fatal {
            kind: HandlerKind::Sign,
            reason: format!("malformed SIG_CREATED: {}", event.args),
        })?;
        try_push(&mut self.result.signatures, sig, HandlerKind::Sign)?;
        Ok(HandlerAction::Consumed)
    }

    fn finish(self: Box<Self>) -> OperationResult {
        OperationResult::Sign(self.result)
    }
}
