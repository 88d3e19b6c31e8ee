//! Engine configuration from environment variables.

use shared_types::Protocol;
use std::env;
use std::path::{Path, PathBuf};

/// Lowest descriptor number the engine-side channels may use; 0-2 are stdio.
const MIN_ENGINE_FD: i32 = 3;

/// Where the engines live and how they are wired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// OpenPGP engine binary
    pub gpg_path: PathBuf,

    /// CMS engine binary
    pub gpgsm_path: PathBuf,

    /// Descriptor number the engine writes status lines to
    pub status_fd: i32,

    /// Descriptor number the engine reads prompt answers from
    pub command_fd: i32,

    /// Trace sink verbosity at which operation traces are recorded
    pub trace_level: u32,

    /// Treat a status stream that ends without `END_STREAM` as an error
    pub require_end_stream: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gpg_path: PathBuf::from("gpg"),
            gpgsm_path: PathBuf::from("gpgsm"),
            status_fd: 3,
            command_fd: 4,
            trace_level: 2,
            require_end_stream: true,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `EB_GPG_PATH`: OpenPGP engine binary (default: gpg)
    /// - `EB_GPGSM_PATH`: CMS engine binary (default: gpgsm)
    /// - `EB_STATUS_FD`: Engine-side status descriptor (default: 3)
    /// - `EB_COMMAND_FD`: Engine-side command descriptor (default: 4)
    /// - `EB_TRACE_LEVEL`: Verbosity for operation traces (default: 2)
    /// - `EB_REQUIRE_END_STREAM`: Require `END_STREAM` (default: true)
    ///
    /// Unparseable values fall back to their defaults, as do descriptor
    /// numbers that collide with stdio or with each other.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut config = Self {
            gpg_path: env::var("EB_GPG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.gpg_path.clone()),

            gpgsm_path: env::var("EB_GPGSM_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.gpgsm_path.clone()),

            status_fd: env::var("EB_STATUS_FD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.status_fd),

            command_fd: env::var("EB_COMMAND_FD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.command_fd),

            trace_level: env::var("EB_TRACE_LEVEL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.trace_level),

            require_end_stream: env::var("EB_REQUIRE_END_STREAM")
                .map(|v| !(v.eq_ignore_ascii_case("false") || v == "0"))
                .unwrap_or(defaults.require_end_stream),
        };
        if !config.descriptors_valid() {
            tracing::warn!(
                status_fd = config.status_fd,
                command_fd = config.command_fd,
                "Invalid engine descriptors, using defaults"
            );
            config.status_fd = defaults.status_fd;
            config.command_fd = defaults.command_fd;
        }
        config
    }

    /// Descriptors are above stdio and distinct.
    #[must_use]
    pub fn descriptors_valid(&self) -> bool {
        self.status_fd >= MIN_ENGINE_FD
            && self.command_fd >= MIN_ENGINE_FD
            && self.status_fd != self.command_fd
    }

    /// Binary for `protocol`.
    #[must_use]
    pub fn program(&self, protocol: Protocol) -> &Path {
        match protocol {
            Protocol::OpenPgp => &self.gpg_path,
            Protocol::Cms => &self.gpgsm_path,
        }
    }

    /// Use `path` for both protocols.
    #[must_use]
    pub fn with_program(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.gpg_path = path.clone();
        self.gpgsm_path = path;
        self
    }

    #[must_use]
    pub fn with_trace_level(mut self, level: u32) -> Self {
        self.trace_level = level;
        self
    }

    #[must_use]
    pub fn with_require_end_stream(mut self, require: bool) -> Self {
        self.require_end_stream = require;
        self
    }
}
