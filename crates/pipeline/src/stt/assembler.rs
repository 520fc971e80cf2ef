//! Provider result assembly

use call_intake_core::TranscriptEvent;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ProviderMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    channel: Option<Channel>,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    speech_final: bool,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

/// Turns streaming recognition results into interim and final text
///
/// Final-but-not-speech-final results accumulate until the provider
/// reports `speech_final`. An `UtteranceEnd` arriving first emits whatever
/// was accumulated.
#[derive(Debug, Default)]
pub struct TranscriptAssembler {
    accumulated: String,
    speech_final: bool,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one JSON text frame from the provider
    pub fn on_message(&mut self, raw: &str) -> Option<TranscriptEvent> {
        match serde_json::from_str::<ProviderMessage>(raw) {
            Ok(message) => self.on_result(message),
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable recognition message");
                None
            }
        }
    }

    fn on_result(&mut self, message: ProviderMessage) -> Option<TranscriptEvent> {
        match message.kind.as_str() {
            "Results" => {}
            "UtteranceEnd" => {
                if self.speech_final {
                    return None;
                }
                return self.take_accumulated();
            }
            other => {
                tracing::trace!(kind = other, "Ignoring recognition message");
                return None;
            }
        }

        let text = message
            .channel
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default();

        if message.is_final && !text.trim().is_empty() {
            self.accumulated.push(' ');
            self.accumulated.push_str(text.trim());

            if message.speech_final {
                self.speech_final = true;
                return self.take_accumulated();
            }

            self.speech_final = false;
            return None;
        }

        if text.trim().is_empty() {
            None
        } else {
            Some(TranscriptEvent::Interim(text))
        }
    }

    fn take_accumulated(&mut self) -> Option<TranscriptEvent> {
        let text = std::mem::take(&mut self.accumulated);
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(TranscriptEvent::Final(text.to_string()))
        }
    }
}
