//! # Operation Handlers
//!
//! One [`StatusHandler`](shared_bus::StatusHandler) per operation kind.
//! Composite operations register several of them on one chain.

pub mod decrypt;
pub mod encrypt;
pub mod passphrase;
pub mod sign;
pub mod verify;

pub use decrypt::DecryptHandler;
pub use encrypt::EncryptHandler;
pub use passphrase::{PassphraseHandler, PASSPHRASE_PROMPT};
pub use sign::SignHandler;
pub use verify::VerifyHandler;
