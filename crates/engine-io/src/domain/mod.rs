//! # Domain Layer
//!
//! Pure status-protocol logic, no I/O:
//! - `status`: line-buffered status line parser
//! - `handlers`: per-operation result accumulators
//! - `outcome`: the rule folding an operation into one result or error

pub mod handlers;
pub mod outcome;
pub mod status;
