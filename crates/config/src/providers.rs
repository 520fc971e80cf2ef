//! Speech and language provider configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

/// Live speech-to-text stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Streaming endpoint (`wss://`)
    #[serde(default = "default_recognition_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_deepgram_key")]
    pub api_key: String,

    #[serde(default = "default_recognition_model")]
    pub model: String,

    #[serde(default = "default_encoding")]
    pub encoding: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Provider-side silence before it marks speech final
    #[serde(default = "default_endpointing_ms")]
    pub endpointing_ms: u32,

    /// Provider-side gap before it sends `UtteranceEnd`
    #[serde(default = "default_utterance_end_ms")]
    pub utterance_end_ms: u32,

    #[serde(default = "default_punctuate")]
    pub punctuate: bool,

    /// Reconnects attempted after an abnormal close before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_recognition_endpoint() -> String {
    "wss://api.deepgram.com/v1/listen".to_string()
}

fn default_deepgram_key() -> String {
    std::env::var("DEEPGRAM_API_KEY").unwrap_or_default()
}

fn default_recognition_model() -> String {
    "nova-2".to_string()
}

fn default_encoding() -> String {
    "mulaw".to_string()
}

fn default_sample_rate() -> u32 {
    8000
}

fn default_endpointing_ms() -> u32 {
    200
}

fn default_utterance_end_ms() -> u32 {
    1000
}

fn default_punctuate() -> bool {
    true
}

fn default_max_reconnect_attempts() -> u32 {
    3
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_recognition_endpoint(),
            api_key: default_deepgram_key(),
            model: default_recognition_model(),
            encoding: default_encoding(),
            sample_rate: default_sample_rate(),
            endpointing_ms: default_endpointing_ms(),
            utterance_end_ms: default_utterance_end_ms(),
            punctuate: default_punctuate(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl RecognitionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !self.endpoint.starts_with("ws://") && !self.endpoint.starts_with("wss://") {
            return Err(ConfigError::invalid(
                "recognition.endpoint",
                format!("Expected a ws:// or wss:// URL, got '{}'", self.endpoint),
            ));
        }

        // The provider requires utterance_end_ms >= 1000
        if self.utterance_end_ms < 1000 {
            return Err(ConfigError::invalid(
                "recognition.utterance_end_ms",
                format!("Must be at least 1000, got {}", self.utterance_end_ms),
            ));
        }

        if self.max_reconnect_attempts > 10 {
            return Err(ConfigError::invalid(
                "recognition.max_reconnect_attempts",
                format!("Must be at most 10, got {}", self.max_reconnect_attempts),
            ));
        }

        Ok(())
    }
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default = "default_synthesis_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_deepgram_key")]
    pub api_key: String,

    #[serde(default = "default_voice_model")]
    pub voice_model: String,

    #[serde(default = "default_synthesis_timeout")]
    pub timeout_ms: u64,
}

fn default_synthesis_endpoint() -> String {
    "https://api.deepgram.com/v1/speak".to_string()
}

fn default_voice_model() -> String {
    std::env::var("VOICE_MODEL").unwrap_or_else(|_| "aura-asteria-en".to_string())
}

fn default_synthesis_timeout() -> u64 {
    10_000
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_synthesis_endpoint(),
            api_key: default_deepgram_key(),
            voice_model: default_voice_model(),
            timeout_ms: default_synthesis_timeout(),
        }
    }
}

/// Language model configuration (OpenAI-compatible chat endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_openai_key")]
    pub api_key: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_completion_timeout")]
    pub timeout_ms: u64,

    /// Retries on transport errors and 5xx responses
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Reply text containing this marker is a transfer request
    #[serde(default = "default_transfer_marker")]
    pub transfer_marker: String,

    /// Bound on model round trips per caller turn when tools are called
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_completion_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_key() -> String {
    std::env::var("OPENAI_API_KEY").unwrap_or_default()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    256
}

fn default_temperature() -> f32 {
    0.4
}

fn default_completion_timeout() -> u64 {
    20_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_transfer_marker() -> String {
    "[TRANSFER]".to_string()
}

fn default_max_tool_rounds() -> u32 {
    3
}

fn default_system_prompt() -> String {
    "You are the intake assistant for The Illinois Hammer, a personal injury law firm. \
     You answer the phone, keep replies short and conversational, and ask one question at a time. \
     First find out whether the caller is calling about a new case. If not, call transferToMainLine. \
     If so, collect their name, phone number, email address, accident date, injuries, medical treatment, \
     who was at fault, whether there is a police report, the other party's insurance, and whether they \
     signed anything with an insurer or another lawyer. Save the answers with saveIntakeData, then call \
     transferToAttorney. Never give legal advice."
        .to_string()
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_completion_endpoint(),
            api_key: default_openai_key(),
            model: default_completion_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_ms: default_completion_timeout(),
            max_retries: default_max_retries(),
            transfer_marker: default_transfer_marker(),
            max_tool_rounds: default_max_tool_rounds(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::invalid(
                "completion.temperature",
                format!("Must be between 0.0 and 2.0, got {}", self.temperature),
            ));
        }

        if self.transfer_marker.trim().is_empty() {
            return Err(ConfigError::invalid(
                "completion.transfer_marker",
                "Transfer marker cannot be empty",
            ));
        }

        if self.max_tool_rounds == 0 {
            return Err(ConfigError::invalid(
                "completion.max_tool_rounds",
                "At least one round is required",
            ));
        }

        Ok(())
    }
}
