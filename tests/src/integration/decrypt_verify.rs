//! # Decrypt-and-Verify Flows
//!
//! The composite operation registers a decryption handler and a
//! verification handler on one chain. Both see every status event; the
//! caller gets one combined answer.

#[cfg(test)]
mod tests {
    use super::super::fixtures::memory_sink;
    use engine_io::{
        CryptoApi, CryptoService, DecryptHandler, EngineConfig, MemoryData, OperationContext,
        OperationRequest, ScriptedEngine, ScriptedLauncher, VerifyHandler,
    };
    use shared_bus::HandlerChain;
    use shared_types::{EngineError, HandlerKind, Protocol, SigStatus, Validity};
    use std::sync::Arc;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn service(engine: ScriptedEngine) -> CryptoService {
        let (sink, _log) = memory_sink(0);
        CryptoService::new(
            Arc::new(ScriptedLauncher::new(engine)),
            EngineConfig::default(),
            sink,
        )
    }

    fn context(engine: ScriptedEngine) -> OperationContext {
        let (sink, _log) = memory_sink(0);
        OperationContext::new(
            Protocol::OpenPgp,
            Arc::new(ScriptedLauncher::new(engine)),
            EngineConfig::default(),
            sink,
        )
    }

    fn chain() -> anyhow::Result<HandlerChain> {
        Ok(HandlerChain::new()
            .with(Box::new(DecryptHandler::new()))?
            .with(Box::new(VerifyHandler::new()))?)
    }

    // =============================================================================
    // SCENARIOS
    // =============================================================================

    #[tokio::test]
    async fn test_okay_goodsig_end_stream_is_success() -> anyhow::Result<()> {
        let service = service(
            ScriptedEngine::new()
                .status("DECRYPTION_OKAY")
                .status("GOODSIG 0123456789ABCDEF Alice <alice@example.org>")
                .status("END_STREAM"),
        );
        let (decrypt, verify) = service
            .decrypt_verify(
                MemoryData::from_bytes(&b"ciphertext"[..]).boxed_reader(),
                MemoryData::new().boxed_writer(),
            )
            .await?;

        assert!(decrypt.okay);
        assert_eq!(verify.intersect(), SigStatus::Good);
        assert_eq!(verify.signatures.len(), 1);
        assert_eq!(
            verify.signatures[0].key_id.as_deref(),
            Some("0123456789ABCDEF")
        );
        assert_eq!(
            verify.signatures[0].user_id.as_deref(),
            Some("Alice <alice@example.org>")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_okay_then_close_is_incomplete() {
        let service = service(ScriptedEngine::new().status("DECRYPTION_OKAY"));
        let err = service
            .decrypt_verify(
                MemoryData::new().boxed_reader(),
                MemoryData::new().boxed_writer(),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::IncompleteResult {
                missing: vec![HandlerKind::Verify]
            }
        );
    }

    #[tokio::test]
    async fn test_good_signature_without_decryption_is_error() {
        let service = service(
            ScriptedEngine::new()
                .status("NEWSIG")
                .status("GOODSIG 0123456789ABCDEF Alice")
                .status("VALIDSIG AABBCCDDEEFF00112233445566778899AABBCCDD 2024-01-01 1704067200 0")
                .status("END_STREAM"),
        );
        let err = service
            .decrypt_verify(
                MemoryData::new().boxed_reader(),
                MemoryData::new().boxed_writer(),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::IncompleteResult {
                missing: vec![HandlerKind::Decrypt]
            }
        );
    }

    #[tokio::test]
    async fn test_decryption_failure_outranks_good_signature() {
        let service = service(
            ScriptedEngine::new()
                .status("BEGIN_DECRYPTION")
                .status("GOODSIG K Alice")
                .status("DECRYPTION_FAILED")
                .status("END_DECRYPTION")
                .status("END_STREAM"),
        );
        let err = service
            .decrypt_verify(
                MemoryData::new().boxed_reader(),
                MemoryData::new().boxed_writer(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::DecryptionFailed);
    }

    #[tokio::test]
    async fn test_malformed_line_does_not_break_dispatch() -> anyhow::Result<()> {
        let mut ctx = context(
            ScriptedEngine::new()
                .status("DECRYPTION_OKAY")
                .raw_status("this is not a status line\n")
                .raw_status("[GNUPG:] lowercase keyword\n")
                .status("GOODSIG 0123456789ABCDEF Alice")
                .status("TRUST_FULLY 0 pgp")
                .status("END_STREAM"),
        );
        let outcome = ctx
            .run(OperationRequest::new("decrypt-verify", chain()?))
            .await?;

        assert_eq!(outcome.protocol_errors, 2);
        assert!(outcome.decrypt.as_ref().is_some_and(|d| d.okay));
        let verify = outcome.verify.as_ref().map(|v| v.signatures.clone());
        let signatures = verify.unwrap_or_default();
        assert_eq!(signatures.len(), 1);
        assert_eq!(signatures[0].validity, Validity::Full);
        Ok(())
    }

    #[tokio::test]
    async fn test_split_status_writes_reassemble() -> anyhow::Result<()> {
        let mut ctx = context(
            ScriptedEngine::new()
                .raw_status("[GNUPG:] DECRYPT")
                .raw_status("ION_OKAY\n[GNUPG:] GOODSIG K ")
                .raw_status("Alice\n[GNUPG:] END_STREAM")
                .exit(0),
        );
        let outcome = ctx
            .run(OperationRequest::new("decrypt-verify", chain()?))
            .await?;
        assert_eq!(outcome.protocol_errors, 0);
        assert_eq!(outcome.signature_status(), Some(SigStatus::Good));
        Ok(())
    }

    #[tokio::test]
    async fn test_mixed_signatures_fold_to_mixed() -> anyhow::Result<()> {
        let service = service(
            ScriptedEngine::new()
                .status("DECRYPTION_OKAY")
                .status("NEWSIG")
                .status("GOODSIG 1111111111111111 Alice")
                .status("NEWSIG")
                .status("ERRSIG 2222222222222222 1 8 00 1700000000 9")
                .status("END_STREAM"),
        );
        let (_, verify) = service
            .decrypt_verify(
                MemoryData::new().boxed_reader(),
                MemoryData::new().boxed_writer(),
            )
            .await?;
        assert_eq!(verify.signatures.len(), 2);
        assert_eq!(verify.signatures[1].status, SigStatus::NoKey);
        assert_eq!(verify.intersect(), SigStatus::Mixed);
        Ok(())
    }
}
