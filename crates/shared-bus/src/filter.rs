//! # Code Filters
//!
//! Lets a handler declare which status codes it wants to observe so the
//! chain can skip it for everything else.

use shared_types::StatusCode;

/// Filter over status codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeFilter {
    /// Codes to include. Empty means all codes.
    pub codes: Vec<StatusCode>,
    /// Whether synthetic protocol-error events pass the filter.
    pub protocol_errors: bool,
}

impl CodeFilter {
    /// Create a filter that accepts all events, protocol errors included.
    #[must_use]
    pub fn all() -> Self {
        Self {
            codes: Vec::new(),
            protocol_errors: true,
        }
    }

    /// Create a filter for specific codes.
    #[must_use]
    pub fn codes(codes: Vec<StatusCode>) -> Self {
        Self {
            codes,
            protocol_errors: false,
        }
    }

    /// Also let protocol-error events through.
    #[must_use]
    pub fn with_protocol_errors(mut self) -> Self {
        self.protocol_errors = true;
        self
    }

    /// Check if a code matches this filter.
    #[must_use]
    pub fn matches(&self, code: &StatusCode) -> bool {
        if *code == StatusCode::ProtocolError {
            return self.protocol_errors;
        }
        self.codes.is_empty() || self.codes.contains(code)
    }
}
