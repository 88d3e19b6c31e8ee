//! Encryption handler.

use shared_bus::handler::try_push;
use shared_bus::{CodeFilter, HandlerAction, HandlerError, StatusHandler};
use shared_types::{
    EncryptResult, HandlerKind, InvalidRecipient, OperationResult, StatusCode, StatusEvent,
};

/// Accumulates an [`EncryptResult`].
#[derive(Debug, Default)]
pub struct EncryptHandler {
    result: EncryptResult,
}

impl EncryptHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusHandler for EncryptHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Encrypt
    }

    fn interest(&self) -> CodeFilter {
        CodeFilter::codes(vec![
            StatusCode::BeginEncryption,
            StatusCode::EndEncryption,
            StatusCode::InvRecp,
            StatusCode::NoRecp,
        ])
    }

    fn handle(&mut self, event: &StatusEvent) -> Result<HandlerAction, HandlerError> {
        match event.code {
            StatusCode::BeginEncryption => {}
            StatusCode::EndEncryption => self.result.completed = true,
            // INV_RECP <reason> <recipient>
            StatusCode::InvRecp => {
                let invalid = InvalidRecipient {
                    reason: event.arg(0).and_then(|r| r.parse().ok()).unwrap_or(0),
                    recipient: event.rest_after(1).unwrap_or_default().to_string(),
                };
                try_push(
                    &mut self.result.invalid_recipients,
                    invalid,
                    HandlerKind::Encrypt,
                )?;
            }
            StatusCode::NoRecp => self.result.no_recipients = true,
            _ => return Ok(HandlerAction::Ignored),
        }
        Ok(HandlerAction::Consumed)
    }

    fn finish(self: Box<Self>) -> OperationResult {
        OperationResult::Encrypt(self.result)
    }
}
