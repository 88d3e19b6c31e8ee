//! # Adapters Layer
//!
//! Concrete implementations of the outbound ports plus the channel and
//! data plumbing they share:
//! - `channels`: the live engine and its pipe endpoints
//! - `process`: real subprocess launcher
//! - `scripted`: in-process engine playing a fixed script
//! - `memory`: memory-backed data objects
//! - `passphrase`: fixed-secret passphrase provider

pub mod channels;
pub mod memory;
pub mod passphrase;
pub mod process;
pub mod scripted;

pub use channels::{BoxReader, BoxWriter, ChannelSet, Streams};
pub use memory::MemoryData;
pub use passphrase::StaticPassphrase;
pub use process::ProcessLauncher;
pub use scripted::{ScriptRecord, ScriptedEngine, ScriptedLauncher};
