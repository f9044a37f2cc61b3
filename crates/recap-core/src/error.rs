use thiserror::Error;

use crate::family::ModelFamily;

/// Raised by the request builder when the model family is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported model family for {model_id}")]
pub struct UnsupportedFamily {
    pub model_id: String,
}

/// Errors from the inference transport, classified by cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("authorization failed: {0}")]
    Unauthorized(String),

    #[error("model or endpoint not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request rejected: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("transport error: {0}")]
    Unknown(String),
}

impl TransportError {
    /// Stable tag for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Unauthorized(_) => "unauthorized",
            TransportError::NotFound(_) => "not_found",
            TransportError::RateLimited(_) => "rate_limited",
            TransportError::Validation(_) => "validation",
            TransportError::Network(_) => "network",
            TransportError::Unknown(_) => "unknown",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::RateLimited(_))
    }
}

/// Errors from extracting generated text out of a provider response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{family} response is not valid json: {message}")]
    InvalidBody {
        family: ModelFamily,
        message: String,
    },

    #[error("{family} response is missing {field}")]
    MissingField {
        family: ModelFamily,
        field: &'static str,
    },

    #[error("{family} response contained no text")]
    EmptyText { family: ModelFamily },

    #[error("cannot parse response for unsupported model family")]
    UnsupportedFamily,
}

/// Errors from turning generated text into a structured summary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpretError {
    #[error("no json payload found in model output")]
    NoPayload,

    #[error("model output had neither an overview nor usable key points")]
    NothingUsable,
}

/// Any failure on the remote path. All of these are recovered by the local fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error(transparent)]
    UnsupportedFamily(#[from] UnsupportedFamily),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Interpret(#[from] InterpretError),

    #[error("remote call cancelled")]
    Cancelled,
}

impl RemoteError {
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteError::UnsupportedFamily(_) => "unsupported_family",
            RemoteError::Transport(err) => err.kind(),
            RemoteError::Parse(_) => "parse",
            RemoteError::Interpret(_) => "interpret",
            RemoteError::Cancelled => "cancelled",
        }
    }
}

/// Fatal pipeline errors. Reaching one of these is a defect, not an environmental condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("summary violates invariants: {0}")]
    InvalidSummary(String),
}

/// Invalid sampling parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid generation config: {0}")]
pub struct GenerationConfigError(pub String);
