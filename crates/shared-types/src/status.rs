//! # Status Protocol Vocabulary
//!
//! The engine reports machine-readable progress on its status channel, one
//! event per line:
//!
//! ```text
//! [GNUPG:] <KEYWORD> <free-form arguments>
//! ```
//!
//! `StatusCode` names the keywords the built-in handlers understand. A
//! well-formed keyword outside the table is kept as `StatusCode::Unknown`
//! so observers can still see it; a line without a usable keyword becomes
//! the synthetic `StatusCode::ProtocolError`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix every status line carries.
pub const STATUS_PREFIX: &str = "[GNUPG:]";

/// A status keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    // Engine framing
    Enter,
    Leave,
    Abort,
    BeginStream,
    EndStream,
    Progress,
    Error,

    // Signatures
    NewSig,
    GoodSig,
    ExpSig,
    ExpKeySig,
    RevKeySig,
    BadSig,
    ErrSig,
    ValidSig,
    SigId,
    SigExpired,
    KeyExpired,
    KeyRevoked,
    TrustUndefined,
    TrustNever,
    TrustMarginal,
    TrustFully,
    TrustUltimate,
    NotationName,
    NotationData,
    PolicyUrl,

    // Decryption
    BeginDecryption,
    EndDecryption,
    DecryptionOkay,
    DecryptionFailed,
    GoodMdc,
    BadMdc,
    ErrMdc,
    EncTo,
    NoSecKey,
    NoPubKey,
    Plaintext,
    NoData,
    BadArmor,
    Unexpected,

    // Passphrase and prompts
    UserIdHint,
    NeedPassphrase,
    NeedPassphraseSym,
    GoodPassphrase,
    BadPassphrase,
    MissingPassphrase,
    GetBool,
    GetLine,
    GetHidden,
    GotIt,

    // Signing and encryption
    SigCreated,
    BeginEncryption,
    EndEncryption,
    InvRecp,
    NoRecp,

    /// A well-formed keyword the table does not list.
    Unknown(String),

    /// Synthetic code for a line that carries no recognizable keyword.
    ProtocolError,
}

/// Keyword table, in the order the engine documents them.
static KEYWORDS: &[(&str, StatusCode)] = &[
    ("ENTER", StatusCode::Enter),
    ("LEAVE", StatusCode::Leave),
    ("ABORT", StatusCode::Abort),
    ("BEGIN_STREAM", StatusCode::BeginStream),
    ("END_STREAM", StatusCode::EndStream),
    ("PROGRESS", StatusCode::Progress),
    ("ERROR", StatusCode::Error),
    ("NEWSIG", StatusCode::NewSig),
    ("GOODSIG", StatusCode::GoodSig),
    ("EXPSIG", StatusCode::ExpSig),
    ("EXPKEYSIG", StatusCode::ExpKeySig),
    ("REVKEYSIG", StatusCode::RevKeySig),
    ("BADSIG", StatusCode::BadSig),
    ("ERRSIG", StatusCode::ErrSig),
    ("VALIDSIG", StatusCode::ValidSig),
    ("SIG_ID", StatusCode::SigId),
    ("SIGEXPIRED", StatusCode::SigExpired),
    ("KEYEXPIRED", StatusCode::KeyExpired),
    ("KEYREVOKED", StatusCode::KeyRevoked),
    ("TRUST_UNDEFINED", StatusCode::TrustUndefined),
    ("TRUST_NEVER", StatusCode::TrustNever),
    ("TRUST_MARGINAL", StatusCode::TrustMarginal),
    ("TRUST_FULLY", StatusCode::TrustFully),
    ("TRUST_ULTIMATE", StatusCode::TrustUltimate),
    ("NOTATION_NAME", StatusCode::NotationName),
    ("NOTATION_DATA", StatusCode::NotationData),
    ("POLICY_URL", StatusCode::PolicyUrl),
    ("BEGIN_DECRYPTION", StatusCode::BeginDecryption),
    ("END_DECRYPTION", StatusCode::EndDecryption),
    ("DECRYPTION_OKAY", StatusCode::DecryptionOkay),
    ("DECRYPTION_FAILED", StatusCode::DecryptionFailed),
    ("GOODMDC", StatusCode::GoodMdc),
    ("BADMDC", StatusCode::BadMdc),
    ("ERRMDC", StatusCode::ErrMdc),
    ("ENC_TO", StatusCode::EncTo),
    ("NO_SECKEY", StatusCode::NoSecKey),
    ("NO_PUBKEY", StatusCode::NoPubKey),
    ("PLAINTEXT", StatusCode::Plaintext),
    ("NODATA", StatusCode::NoData),
    ("BADARMOR", StatusCode::BadArmor),
    ("UNEXPECTED", StatusCode::Unexpected),
    ("USERID_HINT", StatusCode::UserIdHint),
    ("NEED_PASSPHRASE", StatusCode::NeedPassphrase),
    ("NEED_PASSPHRASE_SYM", StatusCode::NeedPassphraseSym),
    ("GOOD_PASSPHRASE", StatusCode::GoodPassphrase),
    ("BAD_PASSPHRASE", StatusCode::BadPassphrase),
    ("MISSING_PASSPHRASE", StatusCode::MissingPassphrase),
    ("GET_BOOL", StatusCode::GetBool),
    ("GET_LINE", StatusCode::GetLine),
    ("GET_HIDDEN", StatusCode::GetHidden),
    ("GOT_IT", StatusCode::GotIt),
    ("SIG_CREATED", StatusCode::SigCreated),
    ("BEGIN_ENCRYPTION", StatusCode::BeginEncryption),
    ("END_ENCRYPTION", StatusCode::EndEncryption),
    ("INV_RECP", StatusCode::InvRecp),
    ("NO_RECP", StatusCode::NoRecp),
];

impl StatusCode {
    /// Map a keyword to its code.
    ///
    /// Returns `None` when the token is not a keyword at all (empty, or
    /// containing characters other than `A-Z`, `0-9` and `_`).
    #[must_use]
    pub fn from_keyword(token: &str) -> Option<Self> {
        if !is_keyword_token(token) {
            return None;
        }
        let code = KEYWORDS
            .iter()
            .find(|(kw, _)| *kw == token)
            .map(|(_, code)| code.clone())
            .unwrap_or_else(|| StatusCode::Unknown(token.to_string()));
        Some(code)
    }

    /// The keyword as it appears on the wire.
    #[must_use]
    pub fn keyword(&self) -> &str {
        match self {
            StatusCode::Unknown(kw) => kw,
            StatusCode::ProtocolError => "PROTOCOL_ERROR",
            known => KEYWORDS
                .iter()
                .find(|(_, code)| code == known)
                .map(|(kw, _)| *kw)
                .unwrap_or("UNKNOWN"),
        }
    }

    /// Whether this code marks the end of an operation's status stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusCode::EndStream)
    }

    /// Whether the engine now blocks until a line arrives on the command
    /// channel.
    #[must_use]
    pub fn is_prompt(&self) -> bool {
        matches!(
            self,
            StatusCode::GetBool | StatusCode::GetLine | StatusCode::GetHidden
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

fn is_keyword_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
        && token.as_bytes()[0].is_ascii_uppercase()
}

// =============================================================================
// STATUS EVENT
// =============================================================================

/// One parsed status line: a code and its raw argument string.
///
/// Events are handed to every handler by shared reference; nothing in the
/// chain can change what later handlers see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub code: StatusCode,
    pub args: String,
}

impl StatusEvent {
    pub fn new(code: StatusCode, args: impl Into<String>) -> Self {
        Self {
            code,
            args: args.into(),
        }
    }

    /// Synthetic event for a line without a recognizable keyword. The raw
    /// line is kept as the argument string.
    pub fn protocol_error(raw: impl Into<String>) -> Self {
        Self::new(StatusCode::ProtocolError, raw)
    }

    /// The `n`th whitespace-separated argument.
    #[must_use]
    pub fn arg(&self, n: usize) -> Option<&str> {
        self.args.split_whitespace().nth(n)
    }

    /// Everything after the first `n` arguments, with the separating
    /// whitespace trimmed. Used for trailing user ids that contain spaces.
    #[must_use]
    pub fn rest_after(&self, n: usize) -> Option<&str> {
        let mut rest = self.args.trim_start();
        for _ in 0..n {
            let end = rest.find(char::is_whitespace)?;
            rest = rest[end..].trim_start();
        }
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    /// Whether this is the synthetic protocol-error event.
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        self.code == StatusCode::ProtocolError
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.args)
        }
    }
}
