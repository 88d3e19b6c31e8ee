//! # Trace Blocks Under Concurrency
//!
//! Each operation stages its debug output privately and publishes it as one
//! block when it completes. With many operations interleaving on the
//! runtime, the sink must still show every block intact.

#[cfg(test)]
mod tests {
    use super::super::fixtures::memory_sink;
    use engine_io::{
        DecryptHandler, EngineConfig, OperationContext, OperationRequest, ScriptedEngine,
        ScriptedLauncher, VerifyHandler,
    };
    use rand::Rng;
    use shared_bus::HandlerChain;
    use shared_types::Protocol;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn jittered_engine(rng: &mut impl Rng, signatures: usize) -> ScriptedEngine {
        let mut engine = ScriptedEngine::new()
            .status("BEGIN_DECRYPTION")
            .diagnostic("engine: decrypting");
        for n in 0..signatures {
            engine = engine
                .sleep(Duration::from_millis(rng.gen_range(0..4)))
                .status("NEWSIG")
                .status(&format!("GOODSIG {n:016X} Signer {n}"));
        }
        engine
            .sleep(Duration::from_millis(rng.gen_range(0..4)))
            .status("DECRYPTION_OKAY")
            .status("END_DECRYPTION")
            .status("END_STREAM")
    }

    fn chain() -> anyhow::Result<HandlerChain> {
        Ok(HandlerChain::new()
            .with(Box::new(DecryptHandler::new()))?
            .with(Box::new(VerifyHandler::new()))?)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_operations_publish_contiguous_blocks() -> anyhow::Result<()> {
        let (sink, log) = memory_sink(2);
        let operations = 8;

        let mut rng = rand::thread_rng();
        let plans: Vec<(usize, ScriptedEngine)> = (0..operations)
            .map(|_| {
                let signatures = rng.gen_range(1..6);
                (signatures, jittered_engine(&mut rng, signatures))
            })
            .collect();

        let mut tasks = Vec::new();
        let mut expected = HashMap::new();
        for (signatures, engine) in plans {
            let mut ctx = OperationContext::new(
                Protocol::OpenPgp,
                Arc::new(ScriptedLauncher::new(engine)),
                EngineConfig::default(),
                sink.clone(),
            );
            expected.insert(ctx.id().short(), signatures);
            let request = OperationRequest::new("decrypt-verify", chain()?);
            tasks.push(tokio::spawn(async move { ctx.run(request).await }));
        }
        for task in tasks {
            let outcome = task.await??;
            assert!(outcome.decrypt.is_some_and(|d| d.okay));
        }

        let lines = log.lines();
        let mut seen = HashMap::new();
        let mut idx = 0;
        while idx < lines.len() {
            let begin = &lines[idx];
            assert!(begin.starts_with("decrypt-verify: context="), "{begin}");
            let id = begin["decrypt-verify: context=".len()..]
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string();

            idx += 1;
            let mut goodsigs = 0;
            while !lines[idx].starts_with("decrypt-verify: done") {
                assert!(
                    !lines[idx].contains(": context="),
                    "block for {id} interleaved with {}",
                    lines[idx]
                );
                if lines[idx].starts_with("status: GOODSIG") {
                    goodsigs += 1;
                }
                idx += 1;
            }
            idx += 1;
            assert!(seen.insert(id, goodsigs).is_none());
        }

        assert_eq!(seen, expected);
        Ok(())
    }

    #[tokio::test]
    async fn test_block_carries_status_and_diagnostics() -> anyhow::Result<()> {
        let (sink, log) = memory_sink(2);
        let mut ctx = OperationContext::new(
            Protocol::OpenPgp,
            Arc::new(ScriptedLauncher::new(jittered_engine(&mut rand::thread_rng(), 1))),
            EngineConfig::default(),
            sink,
        );
        ctx.run(OperationRequest::new("decrypt-verify", chain()?))
            .await?;

        let lines = log.lines();
        assert!(lines[0].starts_with("decrypt-verify: context="));
        assert!(lines[0].contains("handlers=[Decrypt, Verify]"));
        assert!(lines.contains(&"stderr: engine: decrypting".to_string()));
        assert!(lines.contains(&"status: END_STREAM".to_string()));
        let last = lines.last().map(String::as_str).unwrap_or_default();
        assert!(last.starts_with("decrypt-verify: done exit=Some(0)"));
        Ok(())
    }

    #[tokio::test]
    async fn test_quiet_sink_receives_nothing() -> anyhow::Result<()> {
        let (sink, log) = memory_sink(1);
        let mut ctx = OperationContext::new(
            Protocol::OpenPgp,
            Arc::new(ScriptedLauncher::new(jittered_engine(&mut rand::thread_rng(), 2))),
            EngineConfig::default(),
            sink,
        );
        ctx.run(OperationRequest::new("decrypt-verify", chain()?))
            .await?;
        assert!(log.contents().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_configured_trace_level_applies() -> anyhow::Result<()> {
        let (sink, log) = memory_sink(1);
        let mut ctx = OperationContext::new(
            Protocol::OpenPgp,
            Arc::new(ScriptedLauncher::new(jittered_engine(&mut rand::thread_rng(), 1))),
            EngineConfig::default().with_trace_level(1),
            sink,
        );
        ctx.run(OperationRequest::new("decrypt-verify", chain()?))
            .await?;
        assert!(!log.contents().is_empty());
        Ok(())
    }
}
