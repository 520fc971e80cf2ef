//! Completion collaborator traits

use std::sync::Arc;

use crate::{CallerTurn, CompletionReply, Result};
use async_trait::async_trait;

/// One call's conversation with the language model
///
/// Keeps its own history; replies carry session-wide ordered indices and
/// an ordinary/transfer classification.
#[async_trait]
pub trait CompletionEngine: Send + Sync + 'static {
    /// Produce the spoken reply segments for a finalized caller turn
    async fn complete(&self, turn: &CallerTurn) -> Result<Vec<CompletionReply>>;
}

/// Factory for per-call completion engines
pub trait CompletionProvider: Send + Sync + 'static {
    fn open(&self, call_sid: &str) -> Arc<dyn CompletionEngine>;
}
