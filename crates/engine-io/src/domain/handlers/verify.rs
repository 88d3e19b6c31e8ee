//! Signature verification handler.
//!
//! Keeps one [`Signature`] record per signature the engine reports. `NEWSIG`
//! opens a record that the next verdict line fills in; without `NEWSIG`
//! every verdict line opens a record of its own. Detail lines (`VALIDSIG`,
//! `TRUST_*`, notations) apply to the most recent record.

use shared_bus::handler::try_push;
use shared_bus::{CodeFilter, HandlerAction, HandlerError, StatusHandler};
use shared_types::{
    HandlerKind, Notation, OperationResult, SigStatus, Signature, StatusCode, StatusEvent,
    Validity, VerifyResult,
};

/// `ERRSIG` return code meaning the public key is not available.
const ERRSIG_NO_PUBKEY: &str = "9";

/// Accumulates a [`VerifyResult`].
#[derive(Debug, Default)]
pub struct VerifyHandler {
    result: VerifyResult,
    /// A record opened by `NEWSIG` that no verdict has filled yet.
    awaiting_verdict: bool,
}

impl VerifyHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&mut self) -> Option<&mut Signature> {
        self.result.signatures.last_mut()
    }

    /// The record a verdict line should fill.
    fn verdict_slot(&mut self, status: SigStatus) -> Result<&mut Signature, HandlerError> {
        if !std::mem::take(&mut self.awaiting_verdict) {
            try_push(
                &mut self.result.signatures,
                Signature::new(status),
                HandlerKind::Verify,
            )?;
        }
        let sig = self
            .result
            .signatures
            .last_mut()
            .ok_or(HandlerError::OutOfResources {
                kind: HandlerKind::Verify,
            })?;
        sig.status = status;
        Ok(sig)
    }

    fn verdict(&mut self, event: &StatusEvent, status: SigStatus) -> Result<(), HandlerError> {
        let sig = self.verdict_slot(status)?;
        sig.key_id = event.arg(0).map(str::to_string);
        sig.user_id = event.rest_after(1).map(str::to_string);
        Ok(())
    }

    // ERRSIG <keyid> <pkalgo> <hashalgo> <sig_class> <time> <rc>
    fn error_verdict(&mut self, event: &StatusEvent) -> Result<(), HandlerError> {
        let status = if event.arg(5) == Some(ERRSIG_NO_PUBKEY) {
            SigStatus::NoKey
        } else {
            SigStatus::Error
        };
        let sig = self.verdict_slot(status)?;
        sig.key_id = event.arg(0).map(str::to_string);
        sig.created = event.arg(4).and_then(|t| t.parse().ok());
        Ok(())
    }

    fn set_validity(&mut self, validity: Validity) -> HandlerAction {
        match self.current() {
            Some(sig) => {
                sig.validity = validity;
                HandlerAction::Consumed
            }
            None => HandlerAction::Ignored,
        }
    }
}

impl StatusHandler for VerifyHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Verify
    }

    fn interest(&self) -> CodeFilter {
        CodeFilter::codes(vec![
            StatusCode::NewSig,
            StatusCode::GoodSig,
            StatusCode::ExpSig,
            StatusCode::ExpKeySig,
            StatusCode::RevKeySig,
            StatusCode::BadSig,
            StatusCode::ErrSig,
            StatusCode::ValidSig,
            StatusCode::SigId,
            StatusCode::TrustUndefined,
            StatusCode::TrustNever,
            StatusCode::TrustMarginal,
            StatusCode::TrustFully,
            StatusCode::TrustUltimate,
            StatusCode::NotationName,
            StatusCode::NotationData,
            StatusCode::PolicyUrl,
            StatusCode::NoData,
        ])
    }

    fn handle(&mut self, event: &StatusEvent) -> Result<HandlerAction, HandlerError> {
        match event.code {
            StatusCode::NewSig => {
                try_push(
                    &mut self.result.signatures,
                    Signature::new(SigStatus::Error),
                    HandlerKind::Verify,
                )?;
                self.awaiting_verdict = true;
            }
            StatusCode::GoodSig => self.verdict(event, SigStatus::Good)?,
            StatusCode::ExpSig => self.verdict(event, SigStatus::GoodExpired)?,
            StatusCode::ExpKeySig => self.verdict(event, SigStatus::GoodExpiredKey)?,
            StatusCode::RevKeySig => self.verdict(event, SigStatus::GoodRevokedKey)?,
            StatusCode::BadSig => self.verdict(event, SigStatus::Bad)?,
            StatusCode::ErrSig => self.error_verdict(event)?,
            // VALIDSIG <fpr> <date> <sig_timestamp> <expire_timestamp> ...
            StatusCode::ValidSig => {
                let Some(sig) = self.current() else {
                    return Ok(HandlerAction::Ignored);
                };
                sig.fingerprint = event.arg(0).map(str::to_string);
                if let Some(created) = event.arg(2).and_then(|t| t.parse().ok()) {
                    sig.created = Some(created);
                }
                sig.expires = event
                    .arg(3)
                    .and_then(|t| t.parse().ok())
                    .filter(|&t: &u64| t != 0);
            }
            StatusCode::SigId => {
                if self.current().is_none() {
                    return Ok(HandlerAction::Ignored);
                }
            }
            StatusCode::TrustUndefined => return Ok(self.set_validity(Validity::Undefined)),
            StatusCode::TrustNever => return Ok(self.set_validity(Validity::Never)),
            StatusCode::TrustMarginal => return Ok(self.set_validity(Validity::Marginal)),
            StatusCode::TrustFully => return Ok(self.set_validity(Validity::Full)),
            StatusCode::TrustUltimate => return Ok(self.set_validity(Validity::Ultimate)),
            StatusCode::NotationName => {
                let Some(sig) = self.current() else {
                    return Ok(HandlerAction::Ignored);
                };
                let notation = Notation {
                    name: Some(event.args.clone()),
                    value: String::new(),
                };
                try_push(&mut sig.notations, notation, HandlerKind::Verify)?;
            }
            StatusCode::NotationData => {
                let Some(notation) = self
                    .current()
                    .and_then(|sig| sig.notations.last_mut())
                    .filter(|n| n.name.is_some())
                else {
                    return Ok(HandlerAction::Ignored);
                };
                notation
                    .value
                    .try_reserve(event.args.len())
                    .map_err(|_| HandlerError::OutOfResources {
                        kind: HandlerKind::Verify,
                    })?;
                notation.value.push_str(&event.args);
            }
            StatusCode::PolicyUrl => {
                let Some(sig) = self.current() else {
                    return Ok(HandlerAction::Ignored);
                };
                let notation = Notation {
                    name: None,
                    value: event.args.clone(),
                };
                try_push(&mut sig.notations, notation, HandlerKind::Verify)?;
            }
            StatusCode::NoData => self.result.no_data = true,
            _ => return Ok(HandlerAction::Ignored),
        }
        Ok(HandlerAction::Consumed)
    }

    fn finish(self: Box<Self>) -> OperationResult {
        OperationResult::Verify(self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: &[(StatusCode, &str)]) -> VerifyResult {
        let mut handler = Box::new(VerifyHandler::new());
        for (code, args) in events {
            handler.handle(&StatusEvent::new(code.clone(), *args)).unwrap();
        }
        match handler.finish() {
            OperationResult::Verify(r) => r,
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_single_good_signature() {
        let r = run(&[
            (StatusCode::NewSig, ""),
            (StatusCode::GoodSig, "0123456789ABCDEF Alice Example <alice@example.org>"),
            (
                StatusCode::ValidSig,
                "FPR0123 2024-01-01 1704067200 0 4 0 1 8 00 FPR0123",
            ),
            (StatusCode::TrustUltimate, "0 pgp"),
        ]);
        assert_eq!(r.signatures.len(), 1);
        let sig = &r.signatures[0];
        assert_eq!(sig.status, SigStatus::Good);
        assert_eq!(sig.key_id.as_deref(), Some("0123456789ABCDEF"));
        assert_eq!(sig.user_id.as_deref(), Some("Alice Example <alice@example.org>"));
        assert_eq!(sig.fingerprint.as_deref(), Some("FPR0123"));
        assert_eq!(sig.created, Some(1_704_067_200));
        assert_eq!(sig.expires, None);
        assert_eq!(sig.validity, Validity::Ultimate);
        assert_eq!(r.intersect(), SigStatus::Good);
    }

    #[test]
    fn test_verdicts_without_newsig_open_records() {
        let r = run(&[
            (StatusCode::GoodSig, "K1 A"),
            (StatusCode::BadSig, "K2 B"),
        ]);
        assert_eq!(r.signatures.len(), 2);
        assert_eq!(r.intersect(), SigStatus::Mixed);
    }

    #[test]
    fn test_errsig_missing_key() {
        let r = run(&[(StatusCode::ErrSig, "K3 1 8 00 1700000000 9")]);
        assert_eq!(r.signatures[0].status, SigStatus::NoKey);
        assert_eq!(r.signatures[0].created, Some(1_700_000_000));

        let r = run(&[(StatusCode::ErrSig, "K3 1 8 00 1700000000 4")]);
        assert_eq!(r.signatures[0].status, SigStatus::Error);
    }

    #[test]
    fn test_notations_attach_to_current_signature() {
        let r = run(&[
            (StatusCode::GoodSig, "K1 A"),
            (StatusCode::NotationName, "issuer@example.org"),
            (StatusCode::NotationData, "part1"),
            (StatusCode::NotationData, "part2"),
            (StatusCode::PolicyUrl, "https://example.org/policy"),
        ]);
        let notations = &r.signatures[0].notations;
        assert_eq!(notations.len(), 2);
        assert_eq!(notations[0].name.as_deref(), Some("issuer@example.org"));
        assert_eq!(notations[0].value, "part1part2");
        assert_eq!(notations[1].name, None);
    }

    #[test]
    fn test_detail_lines_without_signature_are_ignored() {
        let mut handler = VerifyHandler::new();
        for code in [StatusCode::ValidSig, StatusCode::TrustFully, StatusCode::SigId] {
            let action = handler.handle(&StatusEvent::new(code, "x")).unwrap();
            assert_eq!(action, HandlerAction::Ignored);
        }
        let action = handler
            .handle(&StatusEvent::new(StatusCode::DecryptionOkay, ""))
            .unwrap();
        assert_eq!(action, HandlerAction::Ignored);
    }

    #[test]
    fn test_nodata_marks_no_signature() {
        let r = run(&[(StatusCode::NoData, "1")]);
        assert!(r.no_data);
        assert_eq!(r.intersect(), SigStatus::NoSignature);
    }
}
