//! # Operation Results
//!
//! Typed records accumulated by operation handlers, one slot per handler
//! kind, and the combined outcome returned by `wait`.
//!
//! Each record carries its own `check()` that maps the accumulated state to
//! the single error the caller should see, if any.

use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// HANDLER KINDS
// =============================================================================

/// The capability a handler provides; also the key of its result slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandlerKind {
    Decrypt,
    Verify,
    Sign,
    Encrypt,
    Passphrase,
}

impl HandlerKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            HandlerKind::Decrypt => "decrypt",
            HandlerKind::Verify => "verify",
            HandlerKind::Sign => "sign",
            HandlerKind::Encrypt => "encrypt",
            HandlerKind::Passphrase => "passphrase",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// DECRYPTION
// =============================================================================

/// A public-key recipient the message was encrypted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub key_id: String,
    pub pubkey_algo: Option<u32>,
}

/// Integrity protection verdict reported alongside decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityStatus {
    Good,
    Bad,
    Error,
}

/// Overall decryption verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecryptStatus {
    Okay,
    Failed,
    NoData,
}

/// Accumulated decryption state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptResult {
    pub okay: bool,
    pub failed: bool,
    pub no_data: bool,
    pub recipients: Vec<Recipient>,
    pub missing_secret_keys: Vec<String>,
    pub file_name: Option<String>,
    pub integrity: Option<IntegrityStatus>,
}

impl DecryptResult {
    /// A reported failure wins over an earlier okay.
    #[must_use]
    pub fn status(&self) -> DecryptStatus {
        if self.failed {
            DecryptStatus::Failed
        } else if self.okay {
            DecryptStatus::Okay
        } else {
            DecryptStatus::NoData
        }
    }

    pub fn check(&self) -> Result<(), EngineError> {
        match self.status() {
            DecryptStatus::Okay => Ok(()),
            DecryptStatus::Failed => Err(EngineError::DecryptionFailed),
            DecryptStatus::NoData => Err(EngineError::NoData),
        }
    }
}

// =============================================================================
// VERIFICATION
// =============================================================================

/// Verdict for one signature, or the folded verdict of several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigStatus {
    Good,
    /// Good signature that has expired.
    GoodExpired,
    /// Good signature made by a key that has since expired.
    GoodExpiredKey,
    /// Good signature made by a revoked key.
    GoodRevokedKey,
    Bad,
    /// The public key needed to check the signature is missing.
    NoKey,
    /// The signature could not be checked.
    Error,
    /// No signature was found.
    NoSignature,
    /// Several signatures with differing verdicts.
    Mixed,
}

/// Owner-trust validity reported for a signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Validity {
    #[default]
    Unknown,
    Undefined,
    Never,
    Marginal,
    Full,
    Ultimate,
}

/// A notation (name/value) or policy URL (no name) attached to a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notation {
    pub name: Option<String>,
    pub value: String,
}

/// One verified signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub status: SigStatus,
    pub key_id: Option<String>,
    pub user_id: Option<String>,
    pub fingerprint: Option<String>,
    pub created: Option<u64>,
    pub expires: Option<u64>,
    pub validity: Validity,
    pub notations: Vec<Notation>,
}

impl Signature {
    #[must_use]
    pub fn new(status: SigStatus) -> Self {
        Self {
            status,
            key_id: None,
            user_id: None,
            fingerprint: None,
            created: None,
            expires: None,
            validity: Validity::Unknown,
            notations: Vec::new(),
        }
    }
}

/// Accumulated verification state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub signatures: Vec<Signature>,
    pub no_data: bool,
}

impl VerifyResult {
    /// Fold all signature verdicts into one.
    #[must_use]
    pub fn intersect(&self) -> SigStatus {
        let mut iter = self.signatures.iter().map(|s| s.status);
        let Some(first) = iter.next() else {
            return SigStatus::NoSignature;
        };
        if iter.all(|s| s == first) {
            first
        } else {
            SigStatus::Mixed
        }
    }

    /// Verification itself never fails the operation: a bad signature is
    /// a result, not an error.
    pub fn check(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

// =============================================================================
// SIGNING
// =============================================================================

/// Kind of signature the engine created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigMode {
    Detached,
    Clear,
    Normal,
}

/// One signature created by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSignature {
    pub mode: SigMode,
    pub pubkey_algo: u32,
    pub hash_algo: u32,
    pub sig_class: u32,
    pub timestamp: u64,
    pub fingerprint: String,
}

/// Accumulated signing state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResult {
    pub signatures: Vec<NewSignature>,
}

impl SignResult {
    pub fn check(&self) -> Result<(), EngineError> {
        if self.signatures.is_empty() {
            Err(EngineError::NoData)
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// ENCRYPTION
// =============================================================================

/// A recipient the engine refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidRecipient {
    pub reason: u32,
    pub recipient: String,
}

/// Accumulated encryption state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptResult {
    pub invalid_recipients: Vec<InvalidRecipient>,
    pub no_recipients: bool,
    pub completed: bool,
}

impl EncryptResult {
    pub fn check(&self) -> Result<(), EngineError> {
        if self.no_recipients {
            Err(EngineError::NoRecipients)
        } else if !self.invalid_recipients.is_empty() {
            Err(EngineError::InvalidRecipients {
                count: self.invalid_recipients.len(),
            })
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// PASSPHRASE
// =============================================================================

/// Last verdict the engine gave on a supplied passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassphraseVerdict {
    Good,
    Bad,
    Missing,
}

/// Accumulated passphrase negotiation state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassphraseResult {
    pub user_id_hint: Option<String>,
    pub key_id: Option<String>,
    pub symmetric: bool,
    pub requests: u32,
    pub verdict: Option<PassphraseVerdict>,
}

impl PassphraseResult {
    pub fn check(&self) -> Result<(), EngineError> {
        match self.verdict {
            Some(PassphraseVerdict::Bad) | Some(PassphraseVerdict::Missing) => {
                Err(EngineError::BadPassphrase)
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// SLOTS AND OUTCOME
// =============================================================================

/// The value a handler deposits into its slot when the operation ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult {
    Decrypt(DecryptResult),
    Verify(VerifyResult),
    Sign(SignResult),
    Encrypt(EncryptResult),
    Passphrase(PassphraseResult),
}

impl OperationResult {
    #[must_use]
    pub fn kind(&self) -> HandlerKind {
        match self {
            OperationResult::Decrypt(_) => HandlerKind::Decrypt,
            OperationResult::Verify(_) => HandlerKind::Verify,
            OperationResult::Sign(_) => HandlerKind::Sign,
            OperationResult::Encrypt(_) => HandlerKind::Encrypt,
            OperationResult::Passphrase(_) => HandlerKind::Passphrase,
        }
    }

    pub fn check(&self) -> Result<(), EngineError> {
        match self {
            OperationResult::Decrypt(r) => r.check(),
            OperationResult::Verify(r) => r.check(),
            OperationResult::Sign(r) => r.check(),
            OperationResult::Encrypt(r) => r.check(),
            OperationResult::Passphrase(r) => r.check(),
        }
    }
}

/// Combined result record of one operation, one slot per handler kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub decrypt: Option<DecryptResult>,
    pub verify: Option<VerifyResult>,
    pub sign: Option<SignResult>,
    pub encrypt: Option<EncryptResult>,
    pub passphrase: Option<PassphraseResult>,
    /// Engine exit code, when it exited normally.
    pub exit_code: Option<i32>,
    /// Malformed status lines seen during the operation.
    pub protocol_errors: u32,
}

impl OperationOutcome {
    /// Whether the slot for `kind` holds a result.
    #[must_use]
    pub fn has(&self, kind: HandlerKind) -> bool {
        match kind {
            HandlerKind::Decrypt => self.decrypt.is_some(),
            HandlerKind::Verify => self.verify.is_some(),
            HandlerKind::Sign => self.sign.is_some(),
            HandlerKind::Encrypt => self.encrypt.is_some(),
            HandlerKind::Passphrase => self.passphrase.is_some(),
        }
    }

    /// Deposit a handler result into its slot. Returns `false` if the slot
    /// was already written.
    pub fn deposit(&mut self, result: OperationResult) -> bool {
        if self.has(result.kind()) {
            return false;
        }
        match result {
            OperationResult::Decrypt(r) => self.decrypt = Some(r),
            OperationResult::Verify(r) => self.verify = Some(r),
            OperationResult::Sign(r) => self.sign = Some(r),
            OperationResult::Encrypt(r) => self.encrypt = Some(r),
            OperationResult::Passphrase(r) => self.passphrase = Some(r),
        }
        true
    }

    /// Folded verification verdict, if a verify slot exists.
    #[must_use]
    pub fn signature_status(&self) -> Option<SigStatus> {
        self.verify.as_ref().map(VerifyResult::intersect)
    }
}
