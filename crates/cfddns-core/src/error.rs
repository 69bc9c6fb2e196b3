//! Error types for the DDNS agent
//!
//! Every failure the agent can observe maps onto one variant here. Callers
//! branch on [`Error::kind`] rather than on message text.

use std::fmt;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid or missing configuration (fatal at startup)
    Config,
    /// Interface enumeration failed at the OS level
    Interface,
    /// The provider answered but reported failure
    Rejected,
    /// The provider could not be reached
    Transport,
    /// The state file could not be read or written
    StateStore,
    /// Anything else
    Other,
}

/// Core error type for the DDNS agent
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network interface enumeration errors
    #[error("Interface error: {0}")]
    Interface(String),

    /// Provider rejected the request, or answered with an unexpected payload
    ///
    /// `code` and `message` come from the first entry of the provider's
    /// `errors` array. They are `None` when the provider supplied neither.
    #[error(
        "Provider rejected request: code {} message {}{}",
        OrNone(.code),
        OrNone(.message),
        http_suffix(.status)
    )]
    Rejected {
        /// Provider error code
        code: Option<i64>,
        /// Provider error message
        message: Option<String>,
        /// HTTP status of the response, when one was received
        status: Option<u16>,
    },

    /// Network-level failure talking to the provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Renders an optional value, or the literal `None` when absent
struct OrNone<'a, T>(&'a Option<T>);

impl<T: fmt::Display> fmt::Display for OrNone<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value}"),
            None => f.write_str("None"),
        }
    }
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an interface error
    pub fn interface(msg: impl Into<String>) -> Self {
        Self::Interface(msg.into())
    }

    /// Create a provider rejection
    pub fn rejected(code: Option<i64>, message: Option<String>, status: Option<u16>) -> Self {
        Self::Rejected {
            code,
            message,
            status,
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Interface(_) => ErrorKind::Interface,
            Self::Rejected { .. } => ErrorKind::Rejected,
            Self::Transport(_) => ErrorKind::Transport,
            Self::StateStore(_) => ErrorKind::StateStore,
            Self::Json(_) | Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Provider error code, if this is a rejection that carried one
    pub fn provider_code(&self) -> Option<i64> {
        match self {
            Self::Rejected { code, .. } => *code,
            _ => None,
        }
    }
}
