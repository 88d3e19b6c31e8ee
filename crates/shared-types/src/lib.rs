//! # Shared Types Crate
//!
//! This crate contains the vocabulary every other Engine Bridge crate speaks:
//! the engine status protocol, the result records accumulated by operation
//! handlers, and the error taxonomy surfaced through `wait`.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: status codes and result records are defined
//!   here once and shared by the dispatch bus and the engine I/O core.
//! - **One Error per Operation**: callers see exactly one `EngineError` (or
//!   success) for a whole handler chain.

pub mod channels;
pub mod entities;
pub mod errors;
pub mod results;
pub mod status;

pub use channels::*;
pub use entities::*;
pub use errors::*;
pub use results::*;
pub use status::*;
