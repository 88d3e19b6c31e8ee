//! Blocking facade over [`CryptoService`] for callers without a runtime.

use crate::adapters::memory::MemoryData;
use crate::ports::inbound::CryptoApi;
use crate::service::CryptoService;
use shared_types::{DecryptResult, EncryptResult, EngineError, SigMode, SignResult, VerifyResult};
use std::future::Future;
use tokio::runtime::{Builder, Runtime};

const WORKER_THREADS: usize = 2;

/// Owns a small runtime and runs each operation to completion on it.
///
/// Must not be called from inside another tokio runtime.
pub struct BlockingEngine {
    runtime: Runtime,
    service: CryptoService,
}

impl BlockingEngine {
    /// # Errors
    /// * `EngineError::ResourceExhausted` - the runtime could not be built
    pub fn new(service: CryptoService) -> Result<Self, EngineError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(WORKER_THREADS)
            .thread_name("engine-io")
            .enable_all()
            .build()
            .map_err(|e| EngineError::ResourceExhausted {
                stage: format!("runtime startup: {e}"),
            })?;
        Ok(Self { runtime, service })
    }

    pub fn from_env() -> Result<Self, EngineError> {
        Self::new(CryptoService::from_env())
    }

    #[must_use]
    pub fn service(&self) -> &CryptoService {
        &self.service
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<(Vec<u8>, DecryptResult), EngineError> {
        let output = MemoryData::new();
        let result = self.block_on(self.service.decrypt(
            MemoryData::from_bytes(ciphertext).boxed_reader(),
            output.boxed_writer(),
        ))?;
        Ok((output.contents(), result))
    }

    pub fn decrypt_verify(
        &self,
        ciphertext: &[u8],
    ) -> Result<(Vec<u8>, DecryptResult, VerifyResult), EngineError> {
        let output = MemoryData::new();
        let (decrypt, verify) = self.block_on(self.service.decrypt_verify(
            MemoryData::from_bytes(ciphertext).boxed_reader(),
            output.boxed_writer(),
        ))?;
        Ok((output.contents(), decrypt, verify))
    }

    pub fn verify(&self, signed: &[u8]) -> Result<VerifyResult, EngineError> {
        self.block_on(
            self.service
                .verify(MemoryData::from_bytes(signed).boxed_reader(), None),
        )
    }

    pub fn sign(&self, message: &[u8], mode: SigMode) -> Result<(Vec<u8>, SignResult), EngineError> {
        let output = MemoryData::new();
        let result = self.block_on(self.service.sign(
            MemoryData::from_bytes(message).boxed_reader(),
            output.boxed_writer(),
            mode,
        ))?;
        Ok((output.contents(), result))
    }

    pub fn encrypt(
        &self,
        recipients: &[String],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, EncryptResult), EngineError> {
        let output = MemoryData::new();
        let result = self.block_on(self.service.encrypt(
            recipients,
            MemoryData::from_bytes(plaintext).boxed_reader(),
            output.boxed_writer(),
        ))?;
        Ok((output.contents(), result))
    }

    pub fn encrypt_sign(
        &self,
        recipients: &[String],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, EncryptResult, SignResult), EngineError> {
        let output = MemoryData::new();
        let (encrypt, sign) = self.block_on(self.service.encrypt_sign(
            recipients,
            MemoryData::from_bytes(plaintext).boxed_reader(),
            output.boxed_writer(),
        ))?;
        Ok((output.contents(), encrypt, sign))
    }
}

impl std::fmt::Debug for BlockingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingEngine")
            .field("service", &self.service)
            .finish()
    }
}
