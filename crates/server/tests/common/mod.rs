//! Scripted collaborators for server tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use call_intake_agent::Collaborators;
use call_intake_config::Settings;
use call_intake_core::{
    CallerTurn, CompletionEngine, CompletionProvider, CompletionReply, Error, RecognitionChannel,
    Result, SpeechRecognizer, SpeechSynthesizer, TranscriptEvent,
};
use call_intake_server::AppState;

pub const PUBLIC_HOST: &str = "intake.example.com";

/// Hands out one recognition stream fed by the test
pub struct FakeRecognizer {
    transcripts: Mutex<Option<mpsc::Receiver<TranscriptEvent>>>,
    audio: Mutex<Vec<mpsc::Receiver<Vec<u8>>>>,
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn open(&self) -> Result<RecognitionChannel> {
        let events = self
            .transcripts
            .lock()
            .take()
            .ok_or_else(|| Error::Recognition("stream already used".to_string()))?;
        let (audio, audio_rx) = mpsc::channel(256);
        self.audio.lock().push(audio_rx);
        Ok(RecognitionChannel { audio, events })
    }

    fn provider_name(&self) -> &str {
        "fake"
    }
}

/// Speaks text as its own bytes
pub struct EchoSynthesizer;

#[async_trait]
impl SpeechSynthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }

    fn provider_name(&self) -> &str {
        "echo"
    }
}

pub struct ScriptedEngine {
    replies: Mutex<VecDeque<Vec<CompletionReply>>>,
}

#[async_trait]
impl CompletionEngine for ScriptedEngine {
    async fn complete(&self, _turn: &CallerTurn) -> Result<Vec<CompletionReply>> {
        Ok(self.replies.lock().pop_front().unwrap_or_default())
    }
}

pub struct ScriptedProvider {
    engine: Arc<ScriptedEngine>,
}

impl CompletionProvider for ScriptedProvider {
    fn open(&self, _call_sid: &str) -> Arc<dyn CompletionEngine> {
        self.engine.clone()
    }
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.server.public_host = PUBLIC_HOST.to_string();
    settings.call.transfer_settle_ms = 100;
    settings.call.transfer_fallback_ms = 5000;
    settings
}

/// App state with scripted collaborators; returns the transcript feed
pub fn test_state(script: Vec<Vec<CompletionReply>>) -> (AppState, mpsc::Sender<TranscriptEvent>) {
    let (transcripts, transcripts_rx) = mpsc::channel(16);
    let collaborators = Collaborators {
        recognizer: Arc::new(FakeRecognizer {
            transcripts: Mutex::new(Some(transcripts_rx)),
            audio: Mutex::new(Vec::new()),
        }),
        synthesizer: Arc::new(EchoSynthesizer),
        completion: Arc::new(ScriptedProvider {
            engine: Arc::new(ScriptedEngine {
                replies: Mutex::new(script.into()),
            }),
        }),
    };
    (AppState::new(test_settings(), collaborators), transcripts)
}
