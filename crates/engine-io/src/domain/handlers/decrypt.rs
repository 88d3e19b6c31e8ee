//! Decryption handler.

use shared_bus::handler::try_push;
use shared_bus::{CodeFilter, HandlerAction, HandlerError, StatusHandler};
use shared_types::{
    DecryptResult, HandlerKind, IntegrityStatus, OperationResult, Recipient, StatusCode,
    StatusEvent,
};

/// Accumulates a [`DecryptResult`].
#[derive(Debug, Default)]
pub struct DecryptHandler {
    result: DecryptResult,
}

impl DecryptHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusHandler for DecryptHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Decrypt
    }

    fn interest(&self) -> CodeFilter {
        CodeFilter::codes(vec![
            StatusCode::BeginDecryption,
            StatusCode::EndDecryption,
            StatusCode::DecryptionOkay,
            StatusCode::DecryptionFailed,
            StatusCode::NoData,
            StatusCode::EncTo,
            StatusCode::NoSecKey,
            StatusCode::Plaintext,
            StatusCode::GoodMdc,
            StatusCode::BadMdc,
            StatusCode::ErrMdc,
        ])
    }

    fn handle(&mut self, event: &StatusEvent) -> Result<HandlerAction, HandlerError> {
        let r = &mut self.result;
        match event.code {
            StatusCode::BeginDecryption | StatusCode::EndDecryption => {}
            StatusCode::DecryptionOkay => r.okay = true,
            StatusCode::DecryptionFailed => r.failed = true,
            StatusCode::NoData => r.no_data = true,
            StatusCode::EncTo => {
                let Some(key_id) = event.arg(0) else {
                    return Ok(HandlerAction::Ignored);
                };
                let recipient = Recipient {
                    key_id: key_id.to_string(),
                    pubkey_algo: event.arg(1).and_then(|a| a.parse().ok()),
                };
                try_push(&mut r.recipients, recipient, HandlerKind::Decrypt)?;
            }
            StatusCode::NoSecKey => {
                let Some(key_id) = event.arg(0) else {
                    return Ok(HandlerAction::Ignored);
                };
                try_push(
                    &mut r.missing_secret_keys,
                    key_id.to_string(),
                    HandlerKind::Decrypt,
                )?;
            }
            // PLAINTEXT <format> <timestamp> [<filename>]
            StatusCode::Plaintext => r.file_name = event.rest_after(2).map(str::to_string),
            StatusCode::GoodMdc => r.integrity = Some(IntegrityStatus::Good),
            StatusCode::BadMdc => r.integrity = Some(IntegrityStatus::Bad),
            StatusCode::ErrMdc => r.integrity = Some(IntegrityStatus::Error),
            _ => return Ok(HandlerAction::Ignored),
        }
        Ok(HandlerAction::Consumed)
    }

    fn finish(self: Box<Self>) -> OperationResult {
        OperationResult::Decrypt(self.result)
    }
}
