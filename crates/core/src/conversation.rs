//! Conversation types: caller turns, completion replies, recognition events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A complete utterance attributed to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerTurn {
    /// Trimmed text of the utterance
    pub text: String,
    /// When the turn was finalized
    pub arrived_at: DateTime<Utc>,
    /// Interaction counter value this turn was emitted under
    pub interaction: u32,
}

impl CallerTurn {
    pub fn new(text: impl Into<String>, interaction: u32) -> Self {
        Self {
            text: text.into(),
            arrived_at: Utc::now(),
            interaction,
        }
    }
}

/// Human line a transfer hands the call to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferTarget {
    /// Caller is not calling about a new case
    MainLine,
    /// Intake finished, hand to an attorney
    Attorney,
}

impl TransferTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferTarget::MainLine => "main_line",
            TransferTarget::Attorney => "attorney",
        }
    }
}

/// How the completion collaborator classified a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyIntent {
    /// Speak it and keep the conversation going
    Ordinary,
    /// Speak it, then hand the call to a human line
    Transfer { target: TransferTarget },
}

/// One spoken segment of a completion reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReply {
    /// Session-wide position of this segment in the ordered audio stream
    pub index: usize,
    /// Text to synthesize
    pub text: String,
    pub intent: ReplyIntent,
    /// Interaction counter of the turn that produced this reply
    pub interaction: u32,
}

impl CompletionReply {
    pub fn ordinary(index: usize, text: impl Into<String>, interaction: u32) -> Self {
        Self {
            index,
            text: text.into(),
            intent: ReplyIntent::Ordinary,
            interaction,
        }
    }

    pub fn transfer(
        index: usize,
        text: impl Into<String>,
        target: TransferTarget,
        interaction: u32,
    ) -> Self {
        Self {
            index,
            text: text.into(),
            intent: ReplyIntent::Transfer { target },
            interaction,
        }
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self.intent, ReplyIntent::Transfer { .. })
    }

    /// A spoken line that ends in a question opens the answer gate
    pub fn asks_question(&self) -> bool {
        self.text.trim_end().ends_with('?')
    }
}

/// Text handed to the synthesis collaborator, with its delivery metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    /// `None` for audio outside the ordered reply stream
    pub index: Option<usize>,
    pub text: String,
    /// Acknowledgment label; transfer replies carry the minted transfer label
    pub label: String,
}

/// Signals produced by the speech-to-text side of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Low-confidence streaming text, may be revised
    Interim(String),
    /// Provider-confirmed end of utterance
    Final(String),
    /// The provider stream dropped; a reconnect attempt is scheduled
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted; the session is text-deaf from here on
    Failed { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asks_question() {
        let reply = CompletionReply::ordinary(0, "Are you calling about a new case? ", 1);
        assert!(reply.asks_question());

        let reply = CompletionReply::ordinary(1, "Thank you.", 1);
        assert!(!reply.asks_question());
    }

    #[test]
    fn test_reply_intent_serialization() {
        let reply = CompletionReply::transfer(4, "Please hold.", TransferTarget::Attorney, 2);
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains("\"kind\":\"transfer\""));
        assert!(json.contains("\"target\":\"attorney\""));
        assert!(reply.is_transfer());
    }
}
