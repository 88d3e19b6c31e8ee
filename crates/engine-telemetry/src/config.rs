//! Telemetry configuration from environment variables.

use std::env;
use std::path::PathBuf;

/// Environment variable carrying `<level>[:<path>]`.
pub const DEBUG_ENV: &str = "EB_DEBUG";

/// Parsed form of the debug variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugSpec {
    /// Verbosity; 0 disables tracing.
    pub level: u32,
    /// Append-mode destination replacing stderr.
    pub file: Option<PathBuf>,
}

impl DebugSpec {
    /// Parse `<level>[:<path>[:...]]`.
    ///
    /// The level is the leading decimal number (anything unparseable counts
    /// as 0). The path runs from the first `:` to the next `:` or the end of
    /// the value, trimmed. It is dropped unless `same_privilege` holds, so a
    /// privileged process cannot be tricked into writing wherever the
    /// environment points.
    #[must_use]
    pub fn parse(value: &str, same_privilege: bool) -> Self {
        let trimmed = value.trim_start();
        let digits: String = trimmed.chars().take_while(char::is_ascii_digit).collect();
        let level = digits.parse().unwrap_or(0);

        let file = match value.split_once(':') {
            Some((_, rest)) if same_privilege => {
                let path = rest.split(':').next().unwrap_or("").trim();
                if path.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(path))
                }
            }
            _ => None,
        };

        Self { level, file }
    }

    /// Read and parse [`DEBUG_ENV`].
    #[must_use]
    pub fn from_env() -> Self {
        match env::var(DEBUG_ENV) {
            Ok(value) => Self::parse(&value, same_privilege()),
            Err(_) => Self::default(),
        }
    }
}

/// Whether the real and effective user ids match.
#[cfg(unix)]
#[must_use]
pub fn same_privilege() -> bool {
    nix::unistd::getuid() == nix::unistd::geteuid()
}

#[cfg(not(unix))]
#[must_use]
pub fn same_privilege() -> bool {
    true
}

/// Configuration for tracing, logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name used as the log target prefix
    pub service_name: String,

    /// Trace sink verbosity and destination
    pub debug: DebugSpec,

    /// Stage transaction traces in spool files instead of memory
    pub spool_traces: bool,

    /// Directory for spool files (default: the system temp dir)
    pub spool_dir: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "engine-bridge".to_string(),
            debug: DebugSpec::default(),
            spool_traces: false,
            spool_dir: None,
            log_level: "info".to_string(),
            console_output: false,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `EB_DEBUG`: `<level>[:<path>]` trace sink verbosity and file
    /// - `EB_DEBUG_SPOOL`: Stage transaction traces on disk (default: false)
    /// - `EB_DEBUG_SPOOL_DIR`: Spool directory (default: system temp dir)
    /// - `EB_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `EB_CONSOLE_OUTPUT`: Enable console log output (default: false)
    /// - `EB_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("EB_SERVICE_NAME")
                .unwrap_or_else(|_| "engine-bridge".to_string()),

            debug: DebugSpec::from_env(),

            spool_traces: env::var("EB_DEBUG_SPOOL")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),

            spool_dir: env::var("EB_DEBUG_SPOOL_DIR").ok().map(PathBuf::from),

            log_level: env::var("EB_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("EB_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),

            json_logs: env::var("EB_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Configuration with a fixed trace level and no file destination.
    pub fn with_level(level: u32) -> Self {
        Self {
            debug: DebugSpec { level, file: None },
            ..Self::default()
        }
    }
}
