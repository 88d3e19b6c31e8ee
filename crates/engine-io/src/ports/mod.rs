//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: API that callers use
//! - **Outbound (Driven)**: engine launching and passphrase supply

pub mod inbound;
pub mod outbound;
