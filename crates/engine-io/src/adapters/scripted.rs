//! # Scripted Engine
//!
//! An in-process stand-in for the engine binary. It plays a fixed script
//! over in-memory duplex channels so the pump, handlers and contexts can
//! be exercised without a real subprocess.

use crate::adapters::channels::ChannelSet;
use crate::ports::outbound::{EngineLauncher, LaunchRequest};
use parking_lot::Mutex;
use shared_types::{EngineError, STATUS_PREFIX};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

const CHANNEL_CAPACITY: usize = 64 * 1024;

/// One thing the scripted engine does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Raw bytes on the status channel, framing included.
    Status(Vec<u8>),
    /// Read one line from the command channel and record it.
    ReadCommand,
    /// Bytes on the data-out channel.
    Output(Vec<u8>),
    /// A line on the diagnostics channel.
    Diagnostic(String),
    Sleep(Duration),
    /// Never finish.
    Hang,
}

/// A script plus the exit code the engine reports when it runs out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedEngine {
    steps: Vec<ScriptStep>,
    exit_code: i32,
}

impl ScriptedEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A well-formed status line, e.g. `status("GOODSIG K Alice")`.
    #[must_use]
    pub fn status(self, keyword_and_args: &str) -> Self {
        self.raw_status(&format!("{STATUS_PREFIX} {keyword_and_args}\n"))
    }

    /// Status channel bytes written verbatim.
    #[must_use]
    pub fn raw_status(mut self, text: &str) -> Self {
        self.steps.push(ScriptStep::Status(text.as_bytes().to_vec()));
        self
    }

    #[must_use]
    pub fn read_command(mut self) -> Self {
        self.steps.push(ScriptStep::ReadCommand);
        self
    }

    #[must_use]
    pub fn output(mut self, bytes: &[u8]) -> Self {
        self.steps.push(ScriptStep::Output(bytes.to_vec()));
        self
    }

    #[must_use]
    pub fn diagnostic(mut self, line: &str) -> Self {
        self.steps.push(ScriptStep::Diagnostic(line.to_string()));
        self
    }

    #[must_use]
    pub fn sleep(mut self, duration: Duration) -> Self {
        self.steps.push(ScriptStep::Sleep(duration));
        self
    }

    #[must_use]
    pub fn hang(mut self) -> Self {
        self.steps.push(ScriptStep::Hang);
        self
    }

    #[must_use]
    pub fn exit(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }
}

/// What the scripted engines saw, shared across launches.
#[derive(Debug, Default)]
pub struct ScriptRecord {
    /// Lines read from the command channel.
    pub commands: Vec<String>,
    /// Everything written to data-in.
    pub input: Vec<u8>,
    /// Every launch request.
    pub requests: Vec<LaunchRequest>,
}

/// Launcher that starts a [`ScriptedEngine`] instead of a subprocess.
#[derive(Debug, Clone)]
pub struct ScriptedLauncher {
    engine: ScriptedEngine,
    fail: bool,
    record: Arc<Mutex<ScriptRecord>>,
    launches: Arc<AtomicUsize>,
}

impl ScriptedLauncher {
    pub fn new(engine: ScriptedEngine) -> Self {
        Self {
            engine,
            fail: false,
            record: Arc::new(Mutex::new(ScriptRecord::default())),
            launches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A launcher whose every launch fails with `EngineSpawn`.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(ScriptedEngine::new())
        }
    }

    /// Handle on the shared record.
    #[must_use]
    pub fn record(&self) -> Arc<Mutex<ScriptRecord>> {
        self.record.clone()
    }

    /// Engines started so far.
    #[must_use]
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EngineLauncher for ScriptedLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<ChannelSet, EngineError> {
        self.record.lock().requests.push(request.clone());
        if self.fail {
            return Err(EngineError::EngineSpawn(
                "scripted engine refused to start".to_string(),
            ));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);

        let (status_ours, mut status_engine) = tokio::io::duplex(CHANNEL_CAPACITY);
        let mut set = ChannelSet::new(Box::new(status_ours));

        let mut data_out_engine = None;
        if request.roles.data_out {
            let (ours, engine) = tokio::io::duplex(CHANNEL_CAPACITY);
            set = set.with_data_out(Box::new(ours));
            data_out_engine = Some(engine);
        }
        let mut diagnostics_engine = None;
        if request.roles.diagnostics {
            let (ours, engine) = tokio::io::duplex(CHANNEL_CAPACITY);
            set = set.with_diagnostics(Box::new(ours));
            diagnostics_engine = Some(engine);
        }
        let mut command_engine = None;
        if request.roles.command {
            let (ours, engine) = tokio::io::duplex(CHANNEL_CAPACITY);
            set = set.with_command(Box::new(ours));
            command_engine = Some(BufReader::new(engine));
        }
        if request.roles.data_in {
            let (ours, mut engine) = tokio::io::duplex(CHANNEL_CAPACITY);
            set = set.with_data_in(Box::new(ours));
            let record = self.record.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = engine.read_to_end(&mut buf).await;
                record.lock().input.extend_from_slice(&buf);
            });
        }

        let steps = self.engine.steps.clone();
        let exit_code = self.engine.exit_code;
        let record = self.record.clone();
        let task = tokio::spawn(async move {
            for step in steps {
                match step {
                    ScriptStep::Status(bytes) => {
                        let _ = status_engine.write_all(&bytes).await;
                    }
                    ScriptStep::ReadCommand => {
                        if let Some(reader) = command_engine.as_mut() {
                            let mut line = String::new();
                            if reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                                let line = line.trim_end_matches('\n').to_string();
                                record.lock().commands.push(line);
                            }
                        }
                    }
                    ScriptStep::Output(bytes) => {
                        if let Some(writer) = data_out_engine.as_mut() {
                            let _ = writer.write_all(&bytes).await;
                        }
                    }
                    ScriptStep::Diagnostic(line) => {
                        if let Some(writer) = diagnostics_engine.as_mut() {
                            let _ = writer.write_all(format!("{line}\n").as_bytes()).await;
                        }
                    }
                    ScriptStep::Sleep(duration) => tokio::time::sleep(duration).await,
                    ScriptStep::Hang => std::future::pending::<()>().await,
                }
            }
            exit_code
        });

        Ok(set.with_task(task))
    }
}
