//! Streaming speech-to-text
//!
//! - `TranscriptAssembler`: provider results → interim/final text
//! - `DeepgramRecognizer`: live websocket client
//! - `RecognitionSupervisor`: bounded reconnects feeding a session

mod assembler;
mod deepgram;
mod supervisor;

pub use assembler::TranscriptAssembler;
pub use deepgram::DeepgramRecognizer;
pub use supervisor::RecognitionSupervisor;
