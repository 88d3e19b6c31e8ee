//! # Engine Session
//!
//! Hands out operation contexts that report completion on one shared
//! channel, so a caller juggling several operations can service whichever
//! finishes first.

use crate::adapters::process::ProcessLauncher;
use crate::config::EngineConfig;
use crate::context::{Finished, Notifier, OperationContext};
use crate::ports::outbound::EngineLauncher;
use engine_telemetry::{sink, TraceSink};
use shared_types::{ContextId, Protocol};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Factory for contexts sharing a completion channel.
pub struct EngineSession {
    launcher: Arc<dyn EngineLauncher>,
    config: EngineConfig,
    sink: Arc<TraceSink>,
    notifier: Notifier,
    done: Mutex<mpsc::UnboundedReceiver<Finished>>,
}

impl EngineSession {
    pub fn new(launcher: Arc<dyn EngineLauncher>, config: EngineConfig, sink: Arc<TraceSink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            launcher,
            config,
            sink,
            notifier: Notifier {
                tx,
                pending: Arc::new(AtomicUsize::new(0)),
            },
            done: Mutex::new(rx),
        }
    }

    /// Session over real engine subprocesses, configured from the
    /// environment, tracing to the process-wide sink.
    pub fn from_env() -> Self {
        let config = EngineConfig::from_env();
        let launcher = Arc::new(ProcessLauncher::new(config.clone()));
        Self::new(launcher, config, sink::initialize())
    }

    /// A new idle context bound to this session.
    #[must_use]
    pub fn context(&self, protocol: Protocol) -> OperationContext {
        OperationContext::new(
            protocol,
            self.launcher.clone(),
            self.config.clone(),
            self.sink.clone(),
        )
        .with_notifier(self.notifier.clone())
    }

    /// Operations started through this session that have not finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.notifier.pending.load(Ordering::SeqCst)
    }

    /// Id of the next context whose operation finishes, or `None` once no
    /// operation is pending. Released operations are skipped.
    ///
    /// The returned context still holds the outcome; collect it with
    /// [`OperationContext::wait`].
    pub async fn wait_any(&self) -> Option<ContextId> {
        let mut done = self.done.lock().await;
        loop {
            let message = match done.try_recv() {
                Ok(message) => message,
                Err(_) if self.pending() == 0 => {
                    // A pump queues its message before it decrements, so a
                    // zero count means its message is already visible.
                    match done.try_recv() {
                        Ok(message) => message,
                        Err(_) => return None,
                    }
                }
                Err(_) => done.recv().await?,
            };
            match message {
                Finished::Done(id) => return Some(id),
                Finished::Cancelled(id) => {
                    tracing::debug!(context_id = %id.short(), "Skipping released operation");
                }
            }
        }
    }
}

impl std::fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSession")
            .field("config", &self.config)
            .field("pending", &self.pending())
            .finish()
    }
}
