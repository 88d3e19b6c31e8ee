//! # Subprocess Engines
//!
//! `/bin/sh` scripts stand in for the engine binary. They write status lines
//! to descriptor 3, read prompt answers from descriptor 4, and use stdin,
//! stdout and stderr for data and diagnostics, exactly as a real engine
//! would.

#[cfg(test)]
mod tests {
    use super::super::fixtures::{dir_entries, memory_sink, shell_launcher, spooling_sink};
    use engine_io::{
        CryptoApi, CryptoService, DecryptHandler, EngineConfig, MemoryData, OperationContext,
        OperationRequest, ProcessLauncher, StaticPassphrase, VerifyHandler,
    };
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    use rand::RngCore;
    use shared_bus::HandlerChain;
    use shared_types::{EngineError, Protocol, SigMode, SigStatus};
    use std::sync::Arc;
    use std::time::Duration;

    fn context(script: &str, sink: Arc<engine_telemetry::TraceSink>) -> OperationContext {
        OperationContext::new(
            Protocol::OpenPgp,
            Arc::new(shell_launcher(script)),
            EngineConfig::default(),
            sink,
        )
    }

    fn decrypt_verify_chain() -> anyhow::Result<HandlerChain> {
        Ok(HandlerChain::new()
            .with(Box::new(DecryptHandler::new()))?
            .with(Box::new(VerifyHandler::new()))?)
    }

    const DECRYPT_VERIFY_SCRIPT: &str = r#"
echo '[GNUPG:] BEGIN_DECRYPTION' >&3
echo 'engine: reading input' >&2
cat
echo '[GNUPG:] DECRYPTION_OKAY' >&3
echo '[GNUPG:] GOODSIG 0123456789ABCDEF Alice <alice@example.org>' >&3
echo '[GNUPG:] END_DECRYPTION' >&3
echo '[GNUPG:] END_STREAM' >&3
exit 2
"#;

    #[tokio::test]
    async fn test_decrypt_verify_over_pipes() -> anyhow::Result<()> {
        let (sink, log) = memory_sink(2);
        let mut ctx = context(DECRYPT_VERIFY_SCRIPT, sink);
        let output = MemoryData::new();
        let request = OperationRequest::new("decrypt-verify", decrypt_verify_chain()?)
            .with_input(MemoryData::from_bytes(&b"secret payload"[..]).boxed_reader())
            .with_output(output.boxed_writer());

        let outcome = ctx.run(request).await?;

        assert_eq!(output.contents(), b"secret payload");
        assert_eq!(outcome.signature_status(), Some(SigStatus::Good));
        // A nonzero exit is recorded, not treated as failure.
        assert_eq!(outcome.exit_code, Some(2));
        let lines = log.lines();
        assert!(lines.iter().any(|l| l == "stderr: engine: reading input"));
        assert!(lines.iter().any(|l| l == "status: DECRYPTION_OKAY"));
        Ok(())
    }

    #[tokio::test]
    async fn test_large_payload_both_directions() -> anyhow::Result<()> {
        let mut payload = vec![0u8; 1 << 20];
        rand::thread_rng().fill_bytes(&mut payload);

        let (sink, _log) = memory_sink(0);
        let mut ctx = context(DECRYPT_VERIFY_SCRIPT, sink);
        let output = MemoryData::new();
        let request = OperationRequest::new("decrypt-verify", decrypt_verify_chain()?)
            .with_input(MemoryData::from_bytes(payload.clone()).boxed_reader())
            .with_output(output.boxed_writer());

        let outcome = tokio::time::timeout(Duration::from_secs(30), ctx.run(request)).await??;
        assert!(outcome.decrypt.is_some());
        assert_eq!(output.len(), payload.len());
        assert!(output.contents() == payload);
        Ok(())
    }

    #[tokio::test]
    async fn test_exit_without_end_stream_completes_with_error() -> anyhow::Result<()> {
        let script = r#"
echo '[GNUPG:] DECRYPTION_OKAY' >&3
echo '[GNUPG:] GOODSIG 0123456789ABCDEF Alice' >&3
exit 1
"#;
        let (sink, _log) = memory_sink(0);
        let mut ctx = context(script, sink);
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            ctx.run(OperationRequest::new("decrypt-verify", decrypt_verify_chain()?)),
        )
        .await?;
        assert!(matches!(result, Err(EngineError::Protocol(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_release_kills_reaps_and_removes_spool() -> anyhow::Result<()> {
        let spool_dir = tempfile::tempdir()?;
        let (sink, log) = spooling_sink(2, spool_dir.path());
        let script = r#"
echo '[GNUPG:] BEGIN_DECRYPTION' >&3
exec sleep 30
"#;
        let mut ctx = context(script, sink);
        ctx.start(OperationRequest::new("decrypt-verify", decrypt_verify_chain()?))
            .await?;

        let pid = ctx.pid().ok_or_else(|| anyhow::anyhow!("engine has no pid"))?;
        let spooled = dir_entries(spool_dir.path())?;
        assert_eq!(spooled.len(), 1);
        assert!(spooled[0].starts_with(&format!("eb_trace.{}.", std::process::id())));

        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.release().await;

        assert!(dir_entries(spool_dir.path())?.is_empty());
        assert_eq!(kill(Pid::from_raw(pid as i32), None), Err(Errno::ESRCH));
        assert!(log.contents().is_empty());
        assert!(!ctx.is_pending());
        Ok(())
    }

    #[tokio::test]
    async fn test_passphrase_round_trip_over_command_fd() -> anyhow::Result<()> {
        let script = r#"
echo '[GNUPG:] USERID_HINT 0011223344556677 Alice <alice@example.org>' >&3
echo '[GNUPG:] NEED_PASSPHRASE 0011223344556677 0011223344556677 1 0' >&3
echo '[GNUPG:] GET_HIDDEN passphrase.enter' >&3
read -r answer <&4
if [ "$answer" = "open sesame" ]; then
    echo '[GNUPG:] GOOD_PASSPHRASE' >&3
    cat >/dev/null
    printf 'SIGNATURE'
    echo '[GNUPG:] SIG_CREATED D 1 8 00 1700000000 AABBCCDDEEFF00112233445566778899AABBCCDD' >&3
else
    echo '[GNUPG:] BAD_PASSPHRASE 0011223344556677' >&3
fi
echo '[GNUPG:] END_STREAM' >&3
"#;
        let (sink, _log) = memory_sink(0);
        let service = CryptoService::new(
            Arc::new(shell_launcher(script)),
            EngineConfig::default(),
            sink,
        );

        let output = MemoryData::new();
        let result = service
            .clone()
            .with_passphrase_provider(Arc::new(StaticPassphrase::new("open sesame")))
            .sign(
                MemoryData::from_bytes(&b"message"[..]).boxed_reader(),
                output.boxed_writer(),
                SigMode::Detached,
            )
            .await?;
        assert_eq!(result.signatures.len(), 1);
        assert_eq!(output.contents(), b"SIGNATURE");

        let err = service
            .with_passphrase_provider(Arc::new(StaticPassphrase::new("wrong")))
            .sign(
                MemoryData::from_bytes(&b"message"[..]).boxed_reader(),
                MemoryData::new().boxed_writer(),
                SigMode::Detached,
            )
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::BadPassphrase);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_engine_binary() {
        let (sink, _log) = memory_sink(0);
        let service = CryptoService::new(
            Arc::new(ProcessLauncher::new(
                EngineConfig::default().with_program("/nonexistent/gpg"),
            )),
            EngineConfig::default(),
            sink,
        );
        let err = service
            .verify(MemoryData::new().boxed_reader(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EngineSpawn(_)));
    }
}
