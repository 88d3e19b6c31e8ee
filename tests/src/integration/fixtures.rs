//! # Test Fixtures
//!
//! Engines, launchers and sinks shared by the integration scenarios.

use engine_io::{
    ChannelSet, EngineConfig, EngineLauncher, LaunchRequest, ProcessLauncher, ScriptedEngine,
    ScriptedLauncher,
};
use engine_telemetry::{MemoryLog, SinkTarget, TraceSink};
use shared_types::EngineError;
use std::path::Path;
use std::sync::Arc;

/// Launcher running `script` under `/bin/sh -c`. The engine arguments follow
/// as positional parameters (`$0` is fixed to `engine`).
pub fn shell_launcher(script: &str) -> ProcessLauncher {
    ProcessLauncher::new(EngineConfig::default().with_program("/bin/sh")).with_leading_args(vec![
        "-c".to_string(),
        script.to_string(),
        "engine".to_string(),
    ])
}

/// Sink capturing published traces in memory.
pub fn memory_sink(level: u32) -> (Arc<TraceSink>, MemoryLog) {
    TraceSink::in_memory(level)
}

/// Memory sink whose transaction traces are staged as spool files in `dir`.
pub fn spooling_sink(level: u32, dir: &Path) -> (Arc<TraceSink>, MemoryLog) {
    let log = MemoryLog::new();
    let sink = TraceSink::new(level, SinkTarget::Memory(log.clone()))
        .with_spool(Some(dir.to_path_buf()));
    (Arc::new(sink), log)
}

/// Files currently in `dir`.
pub fn dir_entries(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Picks a scripted engine by a marker in the operation arguments, so one
/// session can run engines that behave differently.
#[derive(Debug, Clone)]
pub struct RoutingLauncher {
    routes: Vec<(String, ScriptedLauncher)>,
}

impl RoutingLauncher {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Requests whose arguments contain `marker` go to `engine`.
    pub fn route(mut self, marker: &str, engine: ScriptedEngine) -> Self {
        self.routes
            .push((marker.to_string(), ScriptedLauncher::new(engine)));
        self
    }
}

impl Default for RoutingLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EngineLauncher for RoutingLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<ChannelSet, EngineError> {
        let route = self
            .routes
            .iter()
            .find(|(marker, _)| request.args.iter().any(|a| a == marker));
        match route {
            Some((_, launcher)) => launcher.launch(request).await,
            None => Err(EngineError::EngineSpawn(format!(
                "no route for {:?}",
                request.args
            ))),
        }
    }
}
