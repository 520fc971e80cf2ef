//! Speech synthesis clients

mod deepgram;

pub use deepgram::DeepgramSynthesizer;
