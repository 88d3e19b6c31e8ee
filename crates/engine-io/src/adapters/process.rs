//! # Process Launcher
//!
//! Starts the engine binary as a subprocess. Data travels over stdin and
//! stdout, diagnostics over stderr. The status and command channels are
//! extra pipes the engine sees at fixed descriptor numbers
//! (`--status-fd` / `--command-fd`).

use crate::adapters::channels::ChannelSet;
use crate::config::EngineConfig;
use crate::ports::outbound::{EngineLauncher, LaunchRequest};
use engine_telemetry::{ENGINES_SPAWNED, SPAWN_FAILURES};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::unistd::{close, dup2, pipe2};
use shared_types::EngineError;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::process::Stdio;
use tokio::net::unix::pipe as async_pipe;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Lowest scratch descriptor used in the child.
const SCRATCH_FD: RawFd = 10;

/// First scratch descriptor above both targets, so a scratch copy can
/// never land on a target number.
fn scratch_floor(status_target: RawFd, command_target: RawFd) -> RawFd {
    SCRATCH_FD.max(status_target.max(command_target) + 1)
}

/// A close-on-exec pipe as (read end, write end). The flag is set
/// atomically: an engine forked concurrently by another context must not
/// inherit either end.
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    pipe2(OFlag::O_CLOEXEC)
}

/// Launches real engine subprocesses.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    config: EngineConfig,
    leading_args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before the launcher's own options, e.g. `-c <script>`
    /// when the "engine" is a shell.
    #[must_use]
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn spawn(&self, request: &LaunchRequest) -> Result<ChannelSet, EngineError> {
        let program = self.config.program(request.protocol);
        let spawn_err = |what: &str, e: &dyn std::fmt::Display| {
            EngineError::EngineSpawn(format!("{}: {what}: {e}", program.display()))
        };

        let (status_read, status_write) =
            cloexec_pipe().map_err(|e| spawn_err("status pipe", &e))?;
        let command_pipe = if request.roles.command {
            Some(cloexec_pipe().map_err(|e| spawn_err("command pipe", &e))?)
        } else {
            None
        };

        let mut cmd = Command::new(program);
        cmd.args(&self.leading_args)
            .arg("--status-fd")
            .arg(self.config.status_fd.to_string())
            .arg("--no-tty");
        if command_pipe.is_some() {
            cmd.arg("--command-fd").arg(self.config.command_fd.to_string());
        } else {
            cmd.arg("--batch");
        }
        cmd.args(&request.args);

        cmd.stdin(if request.roles.data_in {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(if request.roles.data_out {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stderr(if request.roles.diagnostics {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.kill_on_drop(true);

        let status_source = status_write.as_raw_fd();
        let status_target = self.config.status_fd;
        let command_source = command_pipe.as_ref().map(|(read, _)| read.as_raw_fd());
        let command_target = self.config.command_fd;
        let scratch = scratch_floor(status_target, command_target);

        // SAFETY: the closure only calls fcntl, dup2 and close, which are
        // async-signal-safe, and allocates nothing.
        unsafe {
            cmd.pre_exec(move || {
                // Move both sources clear of the targets before placing
                // either, so one placement cannot clobber the other source.
                let status_tmp = fcntl(status_source, FcntlArg::F_DUPFD(scratch))?;
                let command_tmp = match command_source {
                    Some(fd) => Some(fcntl(fd, FcntlArg::F_DUPFD(scratch))?),
                    None => None,
                };
                dup2(status_tmp, status_target)?;
                close(status_tmp)?;
                if let Some(tmp) = command_tmp {
                    dup2(tmp, command_target)?;
                    close(tmp)?;
                }
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|e| spawn_err("spawn", &e))?;
        drop(status_write);
        let command_write = command_pipe.map(|(read, write)| {
            drop(read);
            write
        });

        let status = async_pipe::Receiver::from_owned_fd(status_read)
            .map_err(|e| spawn_err("status channel", &e))?;
        let mut set = ChannelSet::new(Box::new(status));

        if let Some(write) = command_write {
            let command = async_pipe::Sender::from_owned_fd(write)
                .map_err(|e| spawn_err("command channel", &e))?;
            set = set.with_command(Box::new(command));
        }
        if let Some(stdin) = child.stdin.take() {
            set = set.with_data_in(Box::new(stdin));
        }
        if let Some(stdout) = child.stdout.take() {
            set = set.with_data_out(Box::new(stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            set = set.with_diagnostics(Box::new(stderr));
        }
        Ok(set.with_child(child))
    }
}

#[async_trait::async_trait]
impl EngineLauncher for ProcessLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<ChannelSet, EngineError> {
        debug!(
            protocol = %request.protocol,
            args = ?request.args,
            "Launching engine"
        );
        match self.spawn(request) {
            Ok(set) => {
                ENGINES_SPAWNED
                    .with_label_values(&[request.protocol.name()])
                    .inc();
                info!(pid = ?set.pid(), protocol = %request.protocol, "Engine started");
                Ok(set)
            }
            Err(err) => {
                SPAWN_FAILURES.inc();
                warn!(error = %err, "Engine launch failed");
                Err(err)
            }
        }
    }
}
