//! # Inbound Ports (Driving Ports / API)
//!
//! The composite operations callers drive. Each one runs a single engine
//! invocation with a handler chain and waits for the combined result.

use crate::adapters::channels::{BoxReader, BoxWriter};
use shared_types::{DecryptResult, EncryptResult, EngineError, SigMode, SignResult, VerifyResult};

/// Primary crypto API.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait::async_trait]
pub trait CryptoApi: Send + Sync {
    /// Decrypt `input` into `output`.
    async fn decrypt(
        &self,
        input: BoxReader,
        output: BoxWriter,
    ) -> Result<DecryptResult, EngineError>;

    /// Decrypt and check the embedded signatures in one pass.
    ///
    /// Fails unless both the decryption and the verification result are
    /// present and decryption succeeded.
    async fn decrypt_verify(
        &self,
        input: BoxReader,
        output: BoxWriter,
    ) -> Result<(DecryptResult, VerifyResult), EngineError>;

    /// Check the signatures in `input`. A bad signature is a result, not an
    /// error.
    async fn verify(
        &self,
        input: BoxReader,
        output: Option<BoxWriter>,
    ) -> Result<VerifyResult, EngineError>;

    /// Sign `input` into `output`.
    async fn sign(
        &self,
        input: BoxReader,
        output: BoxWriter,
        mode: SigMode,
    ) -> Result<SignResult, EngineError>;

    /// Encrypt `input` to `recipients`.
    async fn encrypt(
        &self,
        recipients: &[String],
        input: BoxReader,
        output: BoxWriter,
    ) -> Result<EncryptResult, EngineError>;

    /// Sign and encrypt in one pass.
    async fn encrypt_sign(
        &self,
        recipients: &[String],
        input: BoxReader,
        output: BoxWriter,
    ) -> Result<(EncryptResult, SignResult), EngineError>;
}
