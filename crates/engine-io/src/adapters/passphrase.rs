//! Fixed-secret passphrase provider.

use crate::ports::outbound::{PassphraseProvider, PassphraseRequest};
use zeroize::Zeroizing;

/// Answers every prompt with the same secret. Gives up after the engine
/// rejects it once.
pub struct StaticPassphrase {
    secret: Zeroizing<String>,
}

impl StaticPassphrase {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Zeroizing::new(secret.to_string()),
        }
    }
}

impl PassphraseProvider for StaticPassphrase {
    fn passphrase(&self, request: &PassphraseRequest<'_>) -> Option<Zeroizing<String>> {
        if request.previous_was_bad {
            return None;
        }
        Some(self.secret.clone())
    }
}

impl std::fmt::Debug for StaticPassphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticPassphrase(<redacted>)")
    }
}
