//! # Engine I/O
//!
//! Drives an OpenPGP/CMS engine subprocess: feeds it data, parses its
//! status protocol, dispatches status events to operation handlers and
//! folds everything into one result per operation.
//!
//! ## Architecture
//!
//! This crate follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): status parsing, handlers, combining rule; no I/O
//! - **Ports Layer** (`ports/`): the crypto API and the launcher/passphrase SPIs
//! - **Adapters Layer** (`adapters/`): subprocess and scripted launchers, channels
//! - **Context** (`context.rs`): one operation and its I/O pump
//! - **Service Layer** (`service.rs`, `session.rs`, `blocking.rs`): composite
//!   operations, session-wide wait, blocking facade
//!
//! ## Guarantees
//!
//! - Status events reach handlers in emission order, each handler in
//!   registration order.
//! - A caller sees exactly one error (or success) per operation.
//! - A released context leaves no running engine and no spool file behind.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod blocking;
pub mod config;
pub mod context;
pub mod domain;
pub mod ports;
pub mod service;
pub mod session;

// Re-export public API
pub use adapters::{
    BoxReader, BoxWriter, ChannelSet, MemoryData, ProcessLauncher, ScriptRecord, ScriptedEngine,
    ScriptedLauncher, StaticPassphrase,
};
pub use blocking::BlockingEngine;
pub use config::EngineConfig;
pub use context::{OperationContext, OperationRequest};
pub use domain::handlers::{
    DecryptHandler, EncryptHandler, PassphraseHandler, SignHandler, VerifyHandler,
    PASSPHRASE_PROMPT,
};
pub use domain::outcome::{combine, Completion};
pub use domain::status::{parse_line, StatusLineParser, MAX_STATUS_LINE};
pub use ports::inbound::CryptoApi;
pub use ports::outbound::{EngineLauncher, LaunchRequest, PassphraseProvider, PassphraseRequest};
pub use service::CryptoService;
pub use session::EngineSession;
