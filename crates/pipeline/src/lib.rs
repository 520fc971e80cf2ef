//! Call audio pipeline
//!
//! This crate provides the per-call audio plumbing:
//! - Ordered delivery of synthesized segments (AudioSequencer)
//! - Debounced, deduplicated caller turns (TurnAggregator)
//! - Streaming speech-to-text with bounded reconnects
//! - HTTP speech synthesis

pub mod sequencer;
pub mod stt;
pub mod tts;
pub mod turn;

pub use sequencer::{AudioSequencer, Delivery, Submitted};
pub use stt::{DeepgramRecognizer, RecognitionSupervisor, TranscriptAssembler};
pub use tts::DeepgramSynthesizer;
pub use turn::{is_near_duplicate, InterimOutcome, TurnAggregator};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Synthesis produced no audio for this segment
    #[error("Empty audio payload for segment {index:?}")]
    EmptyPayload { index: Option<usize> },

    #[error("Transport unavailable")]
    TransportUnavailable,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),
}

impl From<PipelineError> for call_intake_core::Error {
    fn from(err: PipelineError) -> Self {
        use call_intake_core::Error;

        match err {
            PipelineError::EmptyPayload { index } => {
                Error::Synthesis(format!("empty audio payload for segment {:?}", index))
            }
            PipelineError::TransportUnavailable => Error::TransportUnavailable,
            PipelineError::Transport(msg) => Error::Other(msg),
            PipelineError::Stt(msg) => Error::Recognition(msg),
            PipelineError::Tts(msg) => Error::Synthesis(msg),
        }
    }
}

impl From<call_intake_core::Error> for PipelineError {
    fn from(err: call_intake_core::Error) -> Self {
        use call_intake_core::Error;

        match err {
            Error::TransportUnavailable => PipelineError::TransportUnavailable,
            Error::Synthesis(msg) => PipelineError::Tts(msg),
            Error::Recognition(msg) => PipelineError::Stt(msg),
            other => PipelineError::Transport(other.to_string()),
        }
    }
}
