//! # Shared Bus - Status Event Dispatch
//!
//! Routes every status event an engine emits to the ordered chain of
//! operation handlers registered for one operation.
//!
//! ## Dispatch Rules
//!
//! - Every handler sees every event it is interested in, in registration
//!   order.
//! - Events are passed by shared reference: a handler cannot change what a
//!   later handler observes.
//! - Each handler's accumulator is private; the chain only collects the
//!   finished results.
//!
//! ```text
//!                    ┌──────────────────┐
//!  status line ────→ │  HandlerChain    │
//!                    │                  │──→ DecryptHandler  ─→ decrypt slot
//!                    │  (in order)      │──→ VerifyHandler   ─→ verify slot
//!                    └──────────────────┘
//! ```
//!
//! This is what makes composite operations work: decrypt-and-verify
//! registers a decryption handler first and a verification handler second;
//! both observe identical events and fill their own slots.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod chain;
pub mod filter;
pub mod handler;

// Re-export main types
pub use chain::{ChainResults, DispatchReport, HandlerChain};
pub use filter::CodeFilter;
pub use handler::{HandlerAction, HandlerError, StatusHandler};

/// Upper bound on handlers in one chain.
pub const MAX_CHAIN_LEN: usize = 8;
