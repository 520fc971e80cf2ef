//! Per-call intake conversation
//!
//! Holds the call's chat history and the session-wide reply index. Each
//! caller turn becomes one or more spoken replies, classified as ordinary
//! or transfer intent. Transfer intent is either a transfer tool call or
//! the configured marker in the reply text; the marker is stripped before
//! the text is spoken.

use std::sync::Arc;

use async_trait::async_trait;
use call_intake_config::CompletionConfig;
use call_intake_core::{
    CallerTurn, CompletionEngine, CompletionProvider, CompletionReply, Result, TransferTarget,
};
use tokio::sync::Mutex;

use crate::backend::{ChatBackend, ChatMessage};
use crate::segment::split_sentences;
use crate::tools::{IntakeRecord, IntakeTool};
use crate::LlmError;

/// Target assumed when transfer intent comes from the text marker
const MARKER_TARGET: TransferTarget = TransferTarget::MainLine;

struct Conversation {
    history: Vec<ChatMessage>,
    next_index: usize,
}

/// Outcome of one caller turn before indices are assigned
#[derive(Debug, Default, PartialEq)]
struct Spoken {
    lines: Vec<String>,
    transfer: Option<(TransferTarget, String)>,
}

pub struct IntakeCompletion {
    call_sid: String,
    backend: Arc<dyn ChatBackend>,
    transfer_marker: String,
    max_tool_rounds: u32,
    tools: Vec<serde_json::Value>,
    conversation: Mutex<Conversation>,
}

impl IntakeCompletion {
    pub fn new(
        call_sid: impl Into<String>,
        backend: Arc<dyn ChatBackend>,
        config: &CompletionConfig,
    ) -> Self {
        let call_sid = call_sid.into();
        let system = format!(
            "{}\nThe callSid for this call is {}.",
            config.system_prompt, call_sid
        );

        Self {
            call_sid,
            backend,
            transfer_marker: config.transfer_marker.clone(),
            max_tool_rounds: config.max_tool_rounds,
            tools: IntakeTool::manifest(),
            conversation: Mutex::new(Conversation {
                history: vec![ChatMessage::system(system)],
                next_index: 0,
            }),
        }
    }

    /// Run the model until it produces something to say
    async fn converse(
        &self,
        history: &mut Vec<ChatMessage>,
    ) -> std::result::Result<Spoken, LlmError> {
        for round in 1..=self.max_tool_rounds {
            let reply = self.backend.chat(history.as_slice(), &self.tools).await?;
            history.push(reply.clone());

            if reply.tool_calls.is_empty() {
                return Ok(self.classify_text(reply.text_content()));
            }

            let mut spoken = Spoken {
                lines: split_sentences(&self.strip_marker(reply.text_content())),
                transfer: None,
            };
            let mut needs_followup = false;

            for call in &reply.tool_calls {
                let tool = IntakeTool::from_name(&call.function.name);
                let result = match tool {
                    Some(IntakeTool::SaveIntakeData) => {
                        needs_followup = true;
                        IntakeRecord::from_arguments(&call.function.arguments)
                            .save(&self.call_sid)
                    }
                    Some(tool) => match tool.transfer_target() {
                        Some(target) if spoken.transfer.is_none() => {
                            spoken.transfer = Some((target, tool.say().to_string()));
                            serde_json::json!({
                                "status": "transferring",
                                "target": target.as_str(),
                            })
                        }
                        _ => serde_json::json!({
                            "status": "ignored",
                            "reason": "transfer already requested",
                        }),
                    },
                    None => {
                        tracing::warn!(
                            call_sid = %self.call_sid,
                            tool = %call.function.name,
                            "Unknown tool requested"
                        );
                        needs_followup = true;
                        serde_json::json!({ "status": "error", "message": "unknown tool" })
                    }
                };
                history.push(ChatMessage::tool_result(&call.id, &result));
            }

            if spoken.transfer.is_some() || !needs_followup {
                return Ok(spoken);
            }

            tracing::debug!(call_sid = %self.call_sid, round, "Re-querying after tool results");
        }

        Err(LlmError::ToolRounds(self.max_tool_rounds))
    }

    fn classify_text(&self, text: &str) -> Spoken {
        if !text.contains(&self.transfer_marker) {
            return Spoken {
                lines: split_sentences(text),
                transfer: None,
            };
        }

        let mut lines = split_sentences(&self.strip_marker(text));
        let last = lines
            .pop()
            .unwrap_or_else(|| IntakeTool::TransferToMainLine.say().to_string());

        Spoken {
            lines,
            transfer: Some((MARKER_TARGET, last)),
        }
    }

    fn strip_marker(&self, text: &str) -> String {
        text.replace(&self.transfer_marker, " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl CompletionEngine for IntakeCompletion {
    async fn complete(&self, turn: &CallerTurn) -> Result<Vec<CompletionReply>> {
        let mut conversation = self.conversation.lock().await;

        // Work on a copy so a failed turn leaves no half-finished exchange
        let mut history = conversation.history.clone();
        history.push(ChatMessage::user(turn.text.clone()));

        let spoken = self.converse(&mut history).await.map_err(|e| {
            tracing::error!(call_sid = %self.call_sid, error = %e, "Completion failed");
            call_intake_core::Error::from(e)
        })?;

        conversation.history = history;

        let mut replies = Vec::with_capacity(spoken.lines.len() + 1);
        for line in spoken.lines {
            replies.push(CompletionReply::ordinary(
                conversation.next_index,
                line,
                turn.interaction,
            ));
            conversation.next_index += 1;
        }
        if let Some((target, line)) = spoken.transfer {
            tracing::info!(
                call_sid = %self.call_sid,
                target = target.as_str(),
                "Transfer intent"
            );
            replies.push(CompletionReply::transfer(
                conversation.next_index,
                line,
                target,
                turn.interaction,
            ));
            conversation.next_index += 1;
        }

        Ok(replies)
    }
}

/// Opens one `IntakeCompletion` per call over a shared backend
pub struct OpenAIProvider {
    backend: Arc<dyn ChatBackend>,
    config: CompletionConfig,
}

impl OpenAIProvider {
    pub fn new(backend: Arc<dyn ChatBackend>, config: CompletionConfig) -> Self {
        Self { backend, config }
    }
}

impl CompletionProvider for OpenAIProvider {
    fn open(&self, call_sid: &str) -> Arc<dyn CompletionEngine> {
        Arc::new(IntakeCompletion::new(
            call_sid,
            self.backend.clone(),
            &self.config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FunctionCall, Role, ToolCall};
    use call_intake_core::ReplyIntent;
    use parking_lot::Mutex as SyncMutex;
    use std::collections::VecDeque;

    struct ScriptedBackend {
        replies: SyncMutex<VecDeque<std::result::Result<ChatMessage, LlmError>>>,
        seen: SyncMutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<std::result::Result<ChatMessage, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: SyncMutex::new(replies.into()),
                seen: SyncMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _tools: &[serde_json::Value],
        ) -> std::result::Result<ChatMessage, LlmError> {
            self.seen.lock().push(messages.to_vec());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Api("script exhausted".to_string())))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn tool_call(name: &str, arguments: &str) -> ChatMessage {
        ChatMessage {
            role: Role::Assistant,
            content: None,
            tool_calls: vec![ToolCall {
                id: format!("call_{}", name),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }],
            tool_call_id: None,
        }
    }

    fn engine(backend: Arc<ScriptedBackend>) -> IntakeCompletion {
        IntakeCompletion::new("CA1", backend, &CompletionConfig::default())
    }

    #[tokio::test]
    async fn test_ordinary_reply_is_segmented_with_running_indices() {
        let backend = ScriptedBackend::new(vec![
            Ok(ChatMessage::assistant("Thanks. Are you calling about a new case?")),
            Ok(ChatMessage::assistant("What is your name?")),
        ]);
        let engine = engine(backend.clone());

        let first = engine.complete(&CallerTurn::new("hello", 0)).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].index, 0);
        assert_eq!(first[1].index, 1);
        assert!(first[1].asks_question());
        assert!(first.iter().all(|r| r.intent == ReplyIntent::Ordinary));

        let second = engine.complete(&CallerTurn::new("yes", 1)).await.unwrap();
        assert_eq!(second[0].index, 2);
        assert_eq!(second[0].interaction, 1);

        // history carries the first exchange into the second request
        let seen = backend.seen.lock();
        assert_eq!(seen[1].len(), 4);
        assert_eq!(seen[1][0].role, Role::System);
    }

    #[tokio::test]
    async fn test_transfer_tool_call_is_transfer_intent() {
        let backend = ScriptedBackend::new(vec![Ok(tool_call(
            "transferToMainLine",
            r#"{"callSid":"CA1"}"#,
        ))]);
        let engine = engine(backend);

        let replies = engine.complete(&CallerTurn::new("no, billing question", 0)).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(
            replies[0].intent,
            ReplyIntent::Transfer {
                target: TransferTarget::MainLine
            }
        );
        assert_eq!(replies[0].text, "Let me transfer you to our main line.");
    }

    #[tokio::test]
    async fn test_marker_is_transfer_intent_and_stripped() {
        let backend = ScriptedBackend::new(vec![Ok(ChatMessage::assistant(
            "Thank you, Jane. [TRANSFER] Please hold while I connect you.",
        ))]);
        let engine = engine(backend);

        let replies = engine.complete(&CallerTurn::new("that's all", 3)).await.unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].intent, ReplyIntent::Ordinary);
        assert_eq!(replies[1].text, "Please hold while I connect you.");
        assert!(replies[1].is_transfer());
        assert!(replies.iter().all(|r| !r.text.contains("[TRANSFER]")));
    }

    #[tokio::test]
    async fn test_save_intake_requeries_model() {
        let backend = ScriptedBackend::new(vec![
            Ok(tool_call("saveIntakeData", r#"{"name":"Jane Doe"}"#)),
            Ok(tool_call("transferToAttorney", r#"{"callSid":"CA1","intakeData":{}}"#)),
        ]);
        let engine = engine(backend.clone());

        let replies = engine.complete(&CallerTurn::new("no, nothing signed", 5)).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(
            replies[0].intent,
            ReplyIntent::Transfer {
                target: TransferTarget::Attorney
            }
        );

        // second request saw the tool result
        let seen = backend.seen.lock();
        let last = seen[1].last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert!(last.text_content().contains("ILH-"));
    }

    #[tokio::test]
    async fn test_tool_rounds_are_bounded() {
        let backend = ScriptedBackend::new(vec![
            Ok(tool_call("saveIntakeData", "{}")),
            Ok(tool_call("saveIntakeData", "{}")),
            Ok(tool_call("saveIntakeData", "{}")),
            Ok(tool_call("saveIntakeData", "{}")),
        ]);
        let engine = engine(backend);

        let err = engine.complete(&CallerTurn::new("hi", 0)).await.unwrap_err();
        assert!(matches!(err, call_intake_core::Error::Completion(_)));
    }

    #[tokio::test]
    async fn test_failed_turn_leaves_history_untouched() {
        let backend = ScriptedBackend::new(vec![
            Err(LlmError::Timeout),
            Ok(ChatMessage::assistant("Sorry, could you repeat that?")),
        ]);
        let engine = engine(backend.clone());

        assert!(engine.complete(&CallerTurn::new("hello", 0)).await.is_err());
        let replies = engine.complete(&CallerTurn::new("hello again", 0)).await.unwrap();
        assert_eq!(replies[0].index, 0);

        let seen = backend.seen.lock();
        // system + the retried user turn only
        assert_eq!(seen[1].len(), 2);
    }
}
