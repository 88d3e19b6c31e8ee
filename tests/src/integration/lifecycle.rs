//! # Operation Lifecycle
//!
//! Start, wait, release and timeout behavior of contexts, alone and inside a
//! session that reports whichever operation finishes first.

#[cfg(test)]
mod tests {
    use super::super::fixtures::{memory_sink, RoutingLauncher};
    use engine_io::{
        EncryptHandler, EngineConfig, EngineSession, OperationContext, OperationRequest,
        ScriptedEngine, ScriptedLauncher,
    };
    use shared_bus::HandlerChain;
    use shared_types::{EngineError, Protocol};
    use std::sync::Arc;
    use std::time::Duration;

    fn encrypting(delay: Duration) -> ScriptedEngine {
        ScriptedEngine::new()
            .sleep(delay)
            .status("BEGIN_ENCRYPTION 2 9")
            .status("END_ENCRYPTION")
            .status("END_STREAM")
    }

    fn session() -> EngineSession {
        let launcher = RoutingLauncher::new()
            .route("--fast", encrypting(Duration::ZERO))
            .route("--slow", encrypting(Duration::from_millis(200)))
            .route("--hang", ScriptedEngine::new().hang());
        let (sink, _log) = memory_sink(0);
        EngineSession::new(Arc::new(launcher), EngineConfig::default(), sink)
    }

    fn request(marker: &str) -> anyhow::Result<OperationRequest> {
        let chain = HandlerChain::new().with(Box::new(EncryptHandler::new()))?;
        Ok(OperationRequest::new("encrypt", chain).with_args(vec![marker.to_string()]))
    }

    // =============================================================================
    // SESSION
    // =============================================================================

    #[tokio::test]
    async fn test_wait_any_reports_in_completion_order() -> anyhow::Result<()> {
        let session = session();
        let mut slow = session.context(Protocol::OpenPgp);
        let mut fast = session.context(Protocol::OpenPgp);

        slow.start(request("--slow")?).await?;
        fast.start(request("--fast")?).await?;
        assert_eq!(session.pending(), 2);

        assert_eq!(session.wait_any().await, Some(fast.id()));
        assert!(fast.wait(true).await?.is_some_and(|o| o.encrypt.is_some()));
        assert_eq!(session.wait_any().await, Some(slow.id()));
        assert!(slow.wait(true).await?.is_some());

        assert_eq!(session.pending(), 0);
        assert_eq!(session.wait_any().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_released_operation_is_not_reported() -> anyhow::Result<()> {
        let session = session();
        let mut stuck = session.context(Protocol::OpenPgp);
        let mut fast = session.context(Protocol::OpenPgp);

        stuck.start(request("--hang")?).await?;
        stuck.release().await;
        fast.start(request("--fast")?).await?;

        assert_eq!(session.wait_any().await, Some(fast.id()));
        assert_eq!(session.wait_any().await, None);
        assert_eq!(stuck.wait(false).await, Err(EngineError::NoOperation));
        Ok(())
    }

    #[tokio::test]
    async fn test_dropped_context_stops_pending() -> anyhow::Result<()> {
        let session = session();
        let mut stuck = session.context(Protocol::OpenPgp);
        stuck.start(request("--hang")?).await?;
        assert_eq!(session.pending(), 1);
        drop(stuck);

        let drained = tokio::time::timeout(Duration::from_secs(5), session.wait_any()).await?;
        assert_eq!(drained, None);
        assert_eq!(session.pending(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unrouted_start_leaves_session_idle() -> anyhow::Result<()> {
        let session = session();
        let mut ctx = session.context(Protocol::OpenPgp);
        let err = ctx.start(request("--unknown")?).await.unwrap_err();
        assert!(matches!(err, EngineError::EngineSpawn(_)));
        assert_eq!(session.pending(), 0);
        assert!(!ctx.is_pending());
        Ok(())
    }

    // =============================================================================
    // SINGLE CONTEXT
    // =============================================================================

    fn context(engine: ScriptedEngine) -> (OperationContext, ScriptedLauncher) {
        let launcher = ScriptedLauncher::new(engine);
        let (sink, _log) = memory_sink(0);
        let ctx = OperationContext::new(
            Protocol::OpenPgp,
            Arc::new(launcher.clone()),
            EngineConfig::default(),
            sink,
        );
        (ctx, launcher)
    }

    #[tokio::test]
    async fn test_wait_without_operation() {
        let (mut ctx, _) = context(ScriptedEngine::new());
        assert_eq!(ctx.wait(true).await, Err(EngineError::NoOperation));
        assert_eq!(
            ctx.wait_timeout(Duration::from_millis(1)).await,
            Err(EngineError::NoOperation)
        );
    }

    #[tokio::test]
    async fn test_timeout_keeps_operation_pending() -> anyhow::Result<()> {
        let (mut ctx, _) = context(encrypting(Duration::from_millis(200)));
        ctx.start(request("--slow")?).await?;

        assert_eq!(
            ctx.wait_timeout(Duration::from_millis(10)).await,
            Err(EngineError::Timeout)
        );
        assert!(ctx.is_pending());

        let outcome = ctx.wait_timeout(Duration::from_secs(5)).await?;
        assert!(outcome.encrypt.is_some_and(|e| e.completed));
        assert!(!ctx.is_pending());
        Ok(())
    }

    #[tokio::test]
    async fn test_restart_replaces_running_operation() -> anyhow::Result<()> {
        let (mut ctx, launcher) = context(encrypting(Duration::from_millis(100)));
        ctx.start(request("--first")?).await?;
        ctx.start(request("--second")?).await?;

        let outcome = ctx.wait(true).await?;
        assert!(outcome.is_some());
        assert_eq!(launcher.launches(), 2);
        assert_eq!(ctx.wait(true).await, Err(EngineError::NoOperation));
        Ok(())
    }

    #[tokio::test]
    async fn test_context_is_reusable_after_error() -> anyhow::Result<()> {
        let (mut ctx, _) = context(ScriptedEngine::new().status("BEGIN_ENCRYPTION 2 9"));
        let err = ctx.run(request("--a")?).await.unwrap_err();
        assert!(matches!(err, EngineError::Protocol(_)));

        let err = ctx.run(request("--b")?).await.unwrap_err();
        assert!(matches!(err, EngineError::Protocol(_)));
        assert!(!ctx.is_pending());
        Ok(())
    }
}
