//! Collaborator traits for the call intake line
//!
//! Every external party a call session talks to sits behind one of these
//! traits so sessions can be driven by in-process fakes in tests.
//!
//! ```text
//! Speech:
//!   - SpeechRecognizer: caller audio → interim/final text (streaming)
//!   - SpeechSynthesizer: reply text → μ-law audio
//!
//! Completion:
//!   - CompletionProvider: opens one conversation per call
//!   - CompletionEngine: caller turn → classified reply segments
//!
//! Transport:
//!   - MediaSink: outbound half of the carrier media stream
//! ```

mod completion;
mod speech;
mod transport;

pub use completion::{CompletionEngine, CompletionProvider};
pub use speech::{RecognitionChannel, SpeechRecognizer, SpeechSynthesizer, TranscriptEvent};
pub use transport::MediaSink;
