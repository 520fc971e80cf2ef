//! Configuration management for the call intake line
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/` (`default`, then the environment name)
//! - Environment variables (`INTAKE_` prefix, `__` section separator)
//! - Conventional provider variables (`DEEPGRAM_API_KEY`, `OPENAI_API_KEY`,
//!   `SERVER`, `PORT`) as defaults for the matching fields

pub mod call;
pub mod providers;
pub mod settings;

pub use call::{CallConfig, TelephonyConfig};
pub use providers::{CompletionConfig, RecognitionConfig, SynthesisConfig};
pub use settings::{
    load_settings, load_settings_from, ObservabilityConfig, ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => ConfigError::MissingField(key),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}
