//! Intake conversation engine
//!
//! Features:
//! - OpenAI-compatible chat backend with retry
//! - Intake tool manifest (transfers, intake record)
//! - Transfer-intent classification (tool call or reply marker)
//! - Sentence segmentation into ordered spoken replies

pub mod backend;
pub mod intake;
pub mod segment;
pub mod tools;

pub use backend::{ChatBackend, ChatMessage, OpenAIBackend, Role, ToolCall};
pub use intake::{IntakeCompletion, OpenAIProvider};
pub use segment::split_sentences;
pub use tools::{IntakeRecord, IntakeTool};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The model kept calling tools past the per-turn bound
    #[error("Tool rounds exhausted after {0} requests")]
    ToolRounds(u32),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for call_intake_core::Error {
    fn from(err: LlmError) -> Self {
        call_intake_core::Error::Completion(err.to_string())
    }
}
