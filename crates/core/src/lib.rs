//! Core traits and types for the call intake line
//!
//! This crate provides foundational types used across all other crates:
//! - Audio segments handed from synthesis to the carrier
//! - Caller turns, completion replies and recognition events
//! - The carrier media-stream wire protocol
//! - Collaborator traits (STT, TTS, completion, media sink)
//! - Error types

pub mod audio;
pub mod conversation;
pub mod error;
pub mod media;
pub mod traits;

pub use audio::AudioSegment;
pub use conversation::{
    CallerTurn, CompletionReply, RecognitionEvent, ReplyIntent, SpeechRequest, TransferTarget,
};
pub use error::{Error, Result};
pub use media::{
    InboundMessage, MarkPayload, MediaPayload, OutboundFrame, OutboundMessage, StartPayload,
    NORMAL_CLOSURE,
};

pub use traits::{
    CompletionEngine, CompletionProvider, MediaSink, RecognitionChannel, SpeechRecognizer,
    SpeechSynthesizer, TranscriptEvent,
};
