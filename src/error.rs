use std::fmt;
use thiserror::Error;

/// The external collaborator a failed call was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamService {
    AuthenticationServer,
    InstrumentStore,
    OrderAttachment,
    SessionStore,
}

impl fmt::Display for UpstreamService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AuthenticationServer => "authentication server",
            Self::InstrumentStore => "instrument store",
            Self::OrderAttachment => "order attachment service",
            Self::SessionStore => "session store",
        };
        f.write_str(name)
    }
}

/// Failure reported by a port adapter.
///
/// Adapters never decide what a failure means for the challenge flow; the
/// application layer turns every `UpstreamError` into
/// [`ChallengeError::UpstreamUnavailable`].
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Errors surfaced by the challenge session components.
#[derive(Error, Debug)]
pub enum ChallengeError {
    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable {
        service: UpstreamService,
        reason: String,
    },
    #[error("invalid session: {0}")]
    InvalidSession(String),
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),
    #[error("invalid payment session: {0}")]
    InvalidPaymentSession(String),
}

impl ChallengeError {
    /// Stable name used as `errorCode` in HTTP error bodies and `Failure` actions.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable { .. } => "UpstreamUnavailable",
            Self::InvalidSession(_) => "InvalidSession",
            Self::ProtocolMismatch(_) => "ProtocolMismatch",
            Self::InvalidPaymentSession(_) => "InvalidPaymentSession",
        }
    }

    pub fn upstream(service: UpstreamService, err: impl fmt::Display) -> Self {
        Self::UpstreamUnavailable {
            service,
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChallengeError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failures while assembling or starting the gateway process.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to initialise {0}")]
    Upstream(#[from] UpstreamError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}
