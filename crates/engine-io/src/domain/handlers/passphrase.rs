//! Passphrase negotiation handler.
//!
//! Tracks what the engine says about passphrases and answers
//! `GET_HIDDEN passphrase.enter` prompts through a [`PassphraseProvider`].
//! The answer travels back on the command channel, so operations using
//! this handler must request that channel.

use crate::ports::outbound::{PassphraseProvider, PassphraseRequest};
use shared_bus::{CodeFilter, HandlerAction, HandlerError, StatusHandler};
use shared_types::{
    HandlerKind, OperationResult, PassphraseResult, PassphraseVerdict, StatusCode, StatusEvent,
};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Prompt keyword for a passphrase.
pub const PASSPHRASE_PROMPT: &str = "passphrase.enter";

/// Accumulates a [`PassphraseResult`] and answers passphrase prompts.
pub struct PassphraseHandler {
    provider: Arc<dyn PassphraseProvider>,
    result: PassphraseResult,
    /// Argument string of the last `NEED_PASSPHRASE*` line.
    key_info: Option<String>,
    previous_was_bad: bool,
}

impl PassphraseHandler {
    pub fn new(provider: Arc<dyn PassphraseProvider>) -> Self {
        Self {
            provider,
            result: PassphraseResult::default(),
            key_info: None,
            previous_was_bad: false,
        }
    }

    fn answer(&mut self) -> Zeroizing<String> {
        self.result.requests += 1;
        let request = PassphraseRequest {
            user_id_hint: self.result.user_id_hint.as_deref(),
            key_info: self.key_info.as_deref(),
            previous_was_bad: self.previous_was_bad,
            symmetric: self.result.symmetric,
        };
        match self.provider.passphrase(&request) {
            Some(secret) => {
                let mut line = Zeroizing::new(String::with_capacity(secret.len() + 1));
                line.push_str(&secret);
                line.push('\n');
                line
            }
            None => {
                self.result.verdict = Some(PassphraseVerdict::Missing);
                Zeroizing::new("\n".to_string())
            }
        }
    }
}

impl std::fmt::Debug for PassphraseHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassphraseHandler")
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

impl StatusHandler for PassphraseHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Passphrase
    }

    /// Unprotected keys never prompt.
    fn required(&self) -> bool {
        false
    }

    fn interest(&self) -> CodeFilter {
        CodeFilter::codes(vec![
            StatusCode::UserIdHint,
            StatusCode::NeedPassphrase,
            StatusCode::NeedPassphraseSym,
            StatusCode::GoodPassphrase,
            StatusCode::BadPassphrase,
            StatusCode::MissingPassphrase,
            StatusCode::GetHidden,
        ])
    }

    fn handle(&mut self, event: &StatusEvent) -> Result<HandlerAction, HandlerError> {
        match event.code {
            // USERID_HINT <keyid> <user id>
            StatusCode::UserIdHint => {
                self.result.key_id = event.arg(0).map(str::to_string);
                self.result.user_id_hint = event.rest_after(1).map(str::to_string);
            }
            StatusCode::NeedPassphrase => {
                self.key_info = Some(event.args.clone());
                if self.result.key_id.is_none() {
                    self.result.key_id = event.arg(0).map(str::to_string);
                }
            }
            StatusCode::NeedPassphraseSym => {
                self.key_info = Some(event.args.clone());
                self.result.symmetric = true;
            }
            StatusCode::GoodPassphrase => {
                self.previous_was_bad = false;
                self.result.verdict = Some(PassphraseVerdict::Good);
            }
            StatusCode::BadPassphrase => {
                self.previous_was_bad = true;
                self.result.verdict = Some(PassphraseVerdict::Bad);
            }
            StatusCode::MissingPassphrase => {
                self.result.verdict = Some(PassphraseVerdict::Missing);
            }
            StatusCode::GetHidden if event.arg(0) == Some(PASSPHRASE_PROMPT) => {
                return Ok(HandlerAction::Reply(self.answer()));
            }
            _ => return Ok(HandlerAction::Ignored),
        }
        Ok(HandlerAction::Consumed)
    }

    fn finish(self: Box<Self>) -> OperationResult {
        OperationResult::Passphrase(self.result)
    }
}
