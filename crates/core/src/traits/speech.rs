//! Speech processing traits

use crate::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Text signal produced by a live recognition stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// Streaming hypothesis, may still be revised
    Interim(String),
    /// Provider-confirmed end of utterance
    Final(String),
    /// The stream ended. `normal` is false when the provider dropped it.
    Closed { normal: bool },
}

/// Both directions of one open recognition stream
///
/// Dropping `audio` asks the implementation to close the provider stream.
#[derive(Debug)]
pub struct RecognitionChannel {
    /// Raw caller audio (μ-law, 8 kHz)
    pub audio: mpsc::Sender<Vec<u8>>,
    /// Recognized text, terminated by a single `Closed`
    pub events: mpsc::Receiver<TranscriptEvent>,
}

/// Speech-to-Text interface
///
/// Implementations:
/// - `DeepgramRecognizer` - live websocket streaming
#[async_trait]
pub trait SpeechRecognizer: Send + Sync + 'static {
    /// Open a fresh recognition stream
    async fn open(&self) -> Result<RecognitionChannel>;

    /// Provider name for logging
    fn provider_name(&self) -> &str;
}

/// Text-to-Speech interface
///
/// Implementations:
/// - `DeepgramSynthesizer` - HTTP speak endpoint
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Synthesize text to raw μ-law audio
    ///
    /// An empty payload is never returned as success; implementations
    /// report it as `Error::Synthesis`.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// Provider name for logging
    fn provider_name(&self) -> &str;
}
