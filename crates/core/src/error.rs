//! Error types for the call intake line

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type shared across crates
///
/// Every variant is scoped to a single call session; none is fatal to the
/// process.
#[derive(Error, Debug)]
pub enum Error {
    /// The carrier connection was closed when delivery was attempted.
    /// Dropped, never retried.
    #[error("Transport unavailable")]
    TransportUnavailable,

    /// Speech synthesis returned an error or an empty payload
    #[error("Synthesis failure: {0}")]
    Synthesis(String),

    /// The speech-to-text stream dropped or could not be opened
    #[error("Recognition stream failure: {0}")]
    Recognition(String),

    /// The completion collaborator failed to produce a reply
    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Create a synthesis error
    pub fn synthesis<S: Into<String>>(msg: S) -> Self {
        Error::Synthesis(msg.into())
    }

    /// Whether this error should fast-path a pending transfer
    pub fn is_synthesis_failure(&self) -> bool {
        matches!(self, Error::Synthesis(_))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
