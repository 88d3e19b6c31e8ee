//! # Channel Roles
//!
//! The pipes connecting the library to one engine subprocess.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of one pipe endpoint in a channel set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelRole {
    /// Caller-to-engine bulk data (engine stdin).
    DataIn,
    /// Engine-to-caller bulk data (engine stdout).
    DataOut,
    /// Engine-to-caller status lines on a dedicated descriptor.
    Status,
    /// Engine diagnostics (stderr).
    Diagnostics,
    /// Caller-to-engine replies to prompts on a dedicated descriptor.
    Command,
}

impl ChannelRole {
    /// Lowercase name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ChannelRole::DataIn => "data-in",
            ChannelRole::DataOut => "data-out",
            ChannelRole::Status => "status",
            ChannelRole::Diagnostics => "diagnostics",
            ChannelRole::Command => "command",
        }
    }
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of roles an operation asks the launcher to wire up.
///
/// The status channel is implied and always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRoles {
    pub data_in: bool,
    pub data_out: bool,
    pub diagnostics: bool,
    pub command: bool,
}

impl ChannelRoles {
    /// Data in both directions plus diagnostics; the common case.
    #[must_use]
    pub fn data() -> Self {
        Self {
            data_in: true,
            data_out: true,
            diagnostics: true,
            command: false,
        }
    }

    /// Status channel only.
    #[must_use]
    pub fn status_only() -> Self {
        Self {
            data_in: false,
            data_out: false,
            diagnostics: false,
            command: false,
        }
    }

    /// Add the command channel.
    #[must_use]
    pub fn with_command(mut self) -> Self {
        self.command = true;
        self
    }

    /// Whether a given role is requested.
    #[must_use]
    pub fn contains(&self, role: ChannelRole) -> bool {
        match role {
            ChannelRole::DataIn => self.data_in,
            ChannelRole::DataOut => self.data_out,
            ChannelRole::Status => true,
            ChannelRole::Diagnostics => self.diagnostics,
            ChannelRole::Command => self.command,
        }
    }
}

impl Default for ChannelRoles {
    fn default() -> Self {
        Self::data()
    }
}
