//! # Outbound Ports (Driven Ports / SPI)
//!
//! What the engine core needs from the outside: a way to start an engine
//! and a source of passphrases.

use crate::adapters::channels::ChannelSet;
use shared_types::{ChannelRoles, EngineError, Protocol};
use zeroize::Zeroizing;

/// What to start and which channels to wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub protocol: Protocol,
    pub roles: ChannelRoles,
    /// Operation arguments, appended after the launcher's own options.
    pub args: Vec<String>,
}

impl LaunchRequest {
    pub fn new(protocol: Protocol, roles: ChannelRoles, args: Vec<String>) -> Self {
        Self {
            protocol,
            roles,
            args,
        }
    }
}

/// Starts one engine and hands back its channels.
///
/// On failure no subprocess may be left running and no descriptor may leak.
#[async_trait::async_trait]
pub trait EngineLauncher: Send + Sync {
    /// Start an engine wired to the requested roles.
    ///
    /// # Errors
    /// * `EngineError::EngineSpawn` - the engine or a channel could not be created
    async fn launch(&self, request: &LaunchRequest) -> Result<ChannelSet, EngineError>;
}

/// Context handed to a [`PassphraseProvider`] for one prompt.
#[derive(Debug, Clone, Copy)]
pub struct PassphraseRequest<'a> {
    /// User id from the latest `USERID_HINT`.
    pub user_id_hint: Option<&'a str>,
    /// Arguments of the latest `NEED_PASSPHRASE*` line.
    pub key_info: Option<&'a str>,
    /// The engine rejected the previous answer.
    pub previous_was_bad: bool,
    pub symmetric: bool,
}

/// Supplies passphrases when the engine asks for one.
///
/// Called from inside status dispatch, so it must not block for long.
/// Returning `None` declines the prompt.
pub trait PassphraseProvider: Send + Sync {
    fn passphrase(&self, request: &PassphraseRequest<'_>) -> Option<Zeroizing<String>>;
}
