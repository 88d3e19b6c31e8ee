//! # Crypto Service
//!
//! Implements [`CryptoApi`]: each composite operation builds its handler
//! chain and engine arguments, runs one context to completion and picks its
//! result slots out of the combined outcome.

use crate::adapters::channels::{BoxReader, BoxWriter};
use crate::adapters::process::ProcessLauncher;
use crate::config::EngineConfig;
use crate::context::{OperationContext, OperationRequest};
use crate::domain::handlers::{
    DecryptHandler, EncryptHandler, PassphraseHandler, SignHandler, VerifyHandler,
};
use crate::ports::inbound::CryptoApi;
use crate::ports::outbound::{EngineLauncher, PassphraseProvider};
use engine_telemetry::{sink, TraceSink};
use shared_bus::{HandlerChain, StatusHandler};
use shared_types::{
    ChannelRoles, DecryptResult, EncryptResult, EngineError, HandlerKind, OperationOutcome,
    Protocol, SigMode, SignResult, VerifyResult,
};
use std::sync::Arc;
use tracing::instrument;

/// The composite operations over one launcher.
#[derive(Clone)]
pub struct CryptoService {
    launcher: Arc<dyn EngineLauncher>,
    config: EngineConfig,
    sink: Arc<TraceSink>,
    protocol: Protocol,
    passphrase: Option<Arc<dyn PassphraseProvider>>,
}

fn missing(kind: HandlerKind) -> EngineError {
    EngineError::IncompleteResult {
        missing: vec![kind],
    }
}

fn boxed<H: StatusHandler + 'static>(handler: H) -> Box<dyn StatusHandler> {
    Box::new(handler)
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|a| (*a).to_string()).collect()
}

fn recipient_args(recipients: &[String]) -> Vec<String> {
    recipients
        .iter()
        .flat_map(|r| ["--recipient".to_string(), r.clone()])
        .collect()
}

impl CryptoService {
    pub fn new(launcher: Arc<dyn EngineLauncher>, config: EngineConfig, sink: Arc<TraceSink>) -> Self {
        Self {
            launcher,
            config,
            sink,
            protocol: Protocol::OpenPgp,
            passphrase: None,
        }
    }

    /// Service over real engine subprocesses configured from the environment.
    pub fn from_env() -> Self {
        let config = EngineConfig::from_env();
        let launcher = Arc::new(ProcessLauncher::new(config.clone()));
        Self::new(launcher, config, sink::initialize())
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Answer engine passphrase prompts through `provider`. Operations then
    /// also wire the command channel.
    #[must_use]
    pub fn with_passphrase_provider(mut self, provider: Arc<dyn PassphraseProvider>) -> Self {
        self.passphrase = Some(provider);
        self
    }

    #[must_use]
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// A fresh idle context for this service's protocol.
    #[must_use]
    pub fn context(&self) -> OperationContext {
        OperationContext::new(
            self.protocol,
            self.launcher.clone(),
            self.config.clone(),
            self.sink.clone(),
        )
    }

    /// Build a request: the passphrase handler (when configured) goes first
    /// so a rejected passphrase outranks the failure it causes.
    fn request(
        &self,
        name: &'static str,
        args: Vec<String>,
        handlers: Vec<Box<dyn StatusHandler>>,
    ) -> Result<OperationRequest, EngineError> {
        let mut chain = HandlerChain::new();
        let mut roles = ChannelRoles::data();
        if let Some(provider) = &self.passphrase {
            chain.register(Box::new(PassphraseHandler::new(provider.clone())))?;
            roles = roles.with_command();
        }
        for handler in handlers {
            chain.register(handler)?;
        }
        Ok(OperationRequest::new(name, chain)
            .with_args(args)
            .with_roles(roles))
    }

    async fn run(&self, request: OperationRequest) -> Result<OperationOutcome, EngineError> {
        self.context().run(request).await
    }
}

impl std::fmt::Debug for CryptoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoService")
            .field("protocol", &self.protocol)
            .field("config", &self.config)
            .field("passphrase", &self.passphrase.is_some())
            .finish()
    }
}

#[async_trait::async_trait]
impl CryptoApi for CryptoService {
    #[instrument(skip_all, fields(protocol = %self.protocol))]
    async fn decrypt(&self, input: BoxReader, output: BoxWriter) -> Result<DecryptResult, EngineError> {
        let request = self
            .request(
                "decrypt",
                args(&["--output", "-", "--decrypt"]),
                vec![boxed(DecryptHandler::new())],
            )?
            .with_input(input)
            .with_output(output);
        let outcome = self.run(request).await?;
        outcome.decrypt.ok_or_else(|| missing(HandlerKind::Decrypt))
    }

    #[instrument(skip_all, fields(protocol = %self.protocol))]
    async fn decrypt_verify(
        &self,
        input: BoxReader,
        output: BoxWriter,
    ) -> Result<(DecryptResult, VerifyResult), EngineError> {
        let request = self
            .request(
                "decrypt-verify",
                args(&["--output", "-", "--decrypt"]),
                vec![
                    boxed(DecryptHandler::new()),
                    boxed(VerifyHandler::new()),
                ],
            )?
            .with_input(input)
            .with_output(output);
        let outcome = self.run(request).await?;
        let decrypt = outcome.decrypt.ok_or_else(|| missing(HandlerKind::Decrypt))?;
        let verify = outcome.verify.ok_or_else(|| missing(HandlerKind::Verify))?;
        Ok((decrypt, verify))
    }

    #[instrument(skip_all, fields(protocol = %self.protocol))]
    async fn verify(
        &self,
        input: BoxReader,
        output: Option<BoxWriter>,
    ) -> Result<VerifyResult, EngineError> {
        let argv = if output.is_some() {
            args(&["--output", "-", "--verify", "-"])
        } else {
            args(&["--verify", "-"])
        };
        let mut request = self
            .request("verify", argv, vec![boxed(VerifyHandler::new())])?
            .with_input(input);
        if let Some(output) = output {
            request = request.with_output(output);
        }
        let outcome = self.run(request).await?;
        outcome.verify.ok_or_else(|| missing(HandlerKind::Verify))
    }

    #[instrument(skip_all, fields(protocol = %self.protocol, mode = ?mode))]
    async fn sign(
        &self,
        input: BoxReader,
        output: BoxWriter,
        mode: SigMode,
    ) -> Result<SignResult, EngineError> {
        let flag = match mode {
            SigMode::Detached => "--detach-sign",
            SigMode::Clear => "--clearsign",
            SigMode::Normal => "--sign",
        };
        let request = self
            .request(
                "sign",
                args(&["--output", "-", flag]),
                vec![boxed(SignHandler::new())],
            )?
            .with_input(input)
            .with_output(output);
        let outcome = self.run(request).await?;
        outcome.sign.ok_or_else(|| missing(HandlerKind::Sign))
    }

    #[instrument(skip_all, fields(protocol = %self.protocol, recipients = recipients.len()))]
    async fn encrypt(
        &self,
        recipients: &[String],
        input: BoxReader,
        output: BoxWriter,
    ) -> Result<EncryptResult, EngineError> {
        if recipients.is_empty() {
            return Err(EngineError::NoRecipients);
        }
        let mut argv = args(&["--output", "-", "--encrypt"]);
        argv.extend(recipient_args(recipients));
        let request = self
            .request("encrypt", argv, vec![boxed(EncryptHandler::new())])?
            .with_input(input)
            .with_output(output);
        let outcome = self.run(request).await?;
        outcome.encrypt.ok_or_else(|| missing(HandlerKind::Encrypt))
    }

    #[instrument(skip_all, fields(protocol = %self.protocol, recipients = recipients.len()))]
    async fn encrypt_sign(
        &self,
        recipients: &[String],
        input: BoxReader,
        output: BoxWriter,
    ) -> Result<(EncryptResult, SignResult), EngineError> {
        if recipients.is_empty() {
            return Err(EngineError::NoRecipients);
        }
        let mut argv = args(&["--output", "-", "--encrypt", "--sign"]);
        argv.extend(recipient_args(recipients));
        let request = self
            .request(
                "encrypt-sign",
                argv,
                vec![
                    boxed(EncryptHandler::new()),
                    boxed(SignHandler::new()),
                ],
            )?
            .with_input(input)
            .with_output(output);
        let outcome = self.run(request).await?;
        let encrypt = outcome.encrypt.ok_or_else(|| missing(HandlerKind::Encrypt))?;
        let sign = outcome.sign.ok_or_else(|| missing(HandlerKind::Sign))?;
        Ok((encrypt, sign))
    }
}
