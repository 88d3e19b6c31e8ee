//! # Core Entities
//!
//! Identity and selector types for one in-flight engine request.
//!
//! ## Clusters
//!
//! - **Identity**: `ContextId`
//! - **Engine selection**: `Protocol`

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// IDENTITY
// =============================================================================

/// Unique identifier of an operation context.
///
/// Used to correlate trace blocks, log records and session-wide completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub Uuid);

impl ContextId {
    /// Create a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The first eight hex digits, enough to tell contexts apart in a trace.
    #[must_use]
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// ENGINE SELECTION
// =============================================================================

/// Which engine variant a context drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Protocol {
    /// OpenPGP engine (gpg).
    #[default]
    OpenPgp,
    /// CMS / S/MIME engine (gpgsm).
    Cms,
}

impl Protocol {
    /// Short lowercase name used in logs and metrics labels.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::OpenPgp => "openpgp",
            Protocol::Cms => "cms",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
