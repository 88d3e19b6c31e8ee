//! # Channel Set
//!
//! The live engine plus its pipe endpoints. Streams are boxed so a real
//! subprocess and an in-memory scripted engine look the same to the pump.

use shared_types::ChannelRole;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::debug;

pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Whatever is on the other end of the channels.
pub enum EngineProcess {
    /// A real subprocess.
    Child(Child),
    /// An in-process engine; the task yields its exit code.
    Task(JoinHandle<i32>),
}

/// The stream endpoints, handed to the pump as one unit.
#[derive(Default)]
pub struct Streams {
    pub data_in: Option<BoxWriter>,
    pub data_out: Option<BoxReader>,
    pub status: Option<BoxReader>,
    pub diagnostics: Option<BoxReader>,
    pub command: Option<BoxWriter>,
}

const ROLES: [ChannelRole; 5] = [
    ChannelRole::DataIn,
    ChannelRole::DataOut,
    ChannelRole::Status,
    ChannelRole::Diagnostics,
    ChannelRole::Command,
];

fn slot(role: ChannelRole) -> usize {
    match role {
        ChannelRole::DataIn => 0,
        ChannelRole::DataOut => 1,
        ChannelRole::Status => 2,
        ChannelRole::Diagnostics => 3,
        ChannelRole::Command => 4,
    }
}

/// One engine and its channels.
///
/// There is always exactly one status channel. The engine is reaped at most
/// once; [`reap`](Self::reap) closes whatever is still open first.
pub struct ChannelSet {
    pid: Option<u32>,
    process: Option<EngineProcess>,
    streams: Streams,
    open: [bool; 5],
    exit: Option<Option<i32>>,
}

impl ChannelSet {
    /// Start a set from its status channel.
    pub fn new(status: BoxReader) -> Self {
        let mut open = [false; 5];
        open[slot(ChannelRole::Status)] = true;
        Self {
            pid: None,
            process: None,
            streams: Streams {
                status: Some(status),
                ..Default::default()
            },
            open,
            exit: None,
        }
    }

    #[must_use]
    pub fn with_data_in(mut self, writer: BoxWriter) -> Self {
        self.streams.data_in = Some(writer);
        self.open[slot(ChannelRole::DataIn)] = true;
        self
    }

    #[must_use]
    pub fn with_data_out(mut self, reader: BoxReader) -> Self {
        self.streams.data_out = Some(reader);
        self.open[slot(ChannelRole::DataOut)] = true;
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, reader: BoxReader) -> Self {
        self.streams.diagnostics = Some(reader);
        self.open[slot(ChannelRole::Diagnostics)] = true;
        self
    }

    #[must_use]
    pub fn with_command(mut self, writer: BoxWriter) -> Self {
        self.streams.command = Some(writer);
        self.open[slot(ChannelRole::Command)] = true;
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Child) -> Self {
        self.pid = child.id();
        self.process = Some(EngineProcess::Child(child));
        self
    }

    #[must_use]
    pub fn with_task(mut self, task: JoinHandle<i32>) -> Self {
        self.process = Some(EngineProcess::Task(task));
        self
    }

    /// Process id of a real subprocess.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Move the stream endpoints out for pumping. Open/closed bookkeeping
    /// stays here.
    pub fn take_streams(&mut self) -> Streams {
        std::mem::take(&mut self.streams)
    }

    #[must_use]
    pub fn is_open(&self, role: ChannelRole) -> bool {
        self.open[slot(role)]
    }

    /// Whether `role` is an engine-to-caller channel still worth polling.
    #[must_use]
    pub fn readable(&self, role: ChannelRole) -> bool {
        matches!(
            role,
            ChannelRole::DataOut | ChannelRole::Status | ChannelRole::Diagnostics
        ) && self.is_open(role)
    }

    /// Whether `role` is a caller-to-engine channel that still accepts data.
    #[must_use]
    pub fn writable(&self, role: ChannelRole) -> bool {
        matches!(role, ChannelRole::DataIn | ChannelRole::Command) && self.is_open(role)
    }

    /// Mark `role` closed after its peer signalled end-of-stream.
    pub fn close_on_eof(&mut self, role: ChannelRole) {
        let i = slot(role);
        if self.open[i] {
            debug!(channel = %role, pid = ?self.pid, "Channel closed");
        }
        self.open[i] = false;
        match role {
            ChannelRole::DataIn => self.streams.data_in = None,
            ChannelRole::DataOut => self.streams.data_out = None,
            ChannelRole::Status => self.streams.status = None,
            ChannelRole::Diagnostics => self.streams.diagnostics = None,
            ChannelRole::Command => self.streams.command = None,
        }
    }

    /// Roles still open.
    #[must_use]
    pub fn open_channels(&self) -> Vec<ChannelRole> {
        ROLES.into_iter().filter(|r| self.is_open(*r)).collect()
    }

    /// Forcefully stop the engine without waiting for it.
    pub fn kill(&mut self) {
        if self.exit.is_some() {
            return;
        }
        match &mut self.process {
            Some(EngineProcess::Child(child)) => {
                let _ = child.start_kill();
            }
            Some(EngineProcess::Task(task)) => task.abort(),
            None => {}
        }
    }

    /// Close every channel, then wait for the engine to exit.
    ///
    /// Idempotent: later calls return the first result. Yields the exit
    /// code, or `None` if the engine was killed by a signal or aborted.
    pub async fn reap(&mut self) -> Option<i32> {
        if let Some(code) = self.exit {
            return code;
        }
        for role in ROLES {
            self.close_on_eof(role);
        }
        let code = match self.process.take() {
            Some(EngineProcess::Child(mut child)) => match child.wait().await {
                Ok(status) => status.code(),
                Err(_) => None,
            },
            Some(EngineProcess::Task(task)) => task.await.ok(),
            None => None,
        };
        debug!(pid = ?self.pid, exit_code = ?code, "Engine reaped");
        self.exit = Some(code);
        code
    }

    #[must_use]
    pub fn is_reaped(&self) -> bool {
        self.exit.is_some()
    }
}

impl Drop for ChannelSet {
    fn drop(&mut self) {
        self.kill();
    }
}

impl fmt::Debug for ChannelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSet")
            .field("pid", &self.pid)
            .field("open", &self.open_channels())
            .field("exit", &self.exit)
            .finish()
    }
}
