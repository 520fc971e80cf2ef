//! Application State
//!
//! Shared state across all handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use call_intake_agent::{Collaborators, SessionConfig, SessionRegistry};
use call_intake_config::Settings;
use call_intake_llm::{OpenAIBackend, OpenAIProvider};
use call_intake_pipeline::{DeepgramRecognizer, DeepgramSynthesizer};

use crate::routing::CallRouter;
use crate::ServerError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Calls due for transfer, shared by sessions and the webhook
    pub registry: Arc<SessionRegistry>,
    pub routing: Arc<CallRouter>,
    pub collaborators: Collaborators,
    pub calls: Arc<ActiveCalls>,
}

impl AppState {
    /// Create state around already-built collaborators
    pub fn new(settings: Settings, collaborators: Collaborators) -> Self {
        let registry = Arc::new(SessionRegistry::new(settings.call.registry_ttl()));
        let routing = Arc::new(CallRouter::new(registry.clone(), &settings));
        Self {
            settings: Arc::new(settings),
            registry,
            routing,
            collaborators,
            calls: Arc::new(ActiveCalls::default()),
        }
    }

    /// Build the Deepgram and OpenAI collaborators from settings
    pub fn from_settings(settings: Settings) -> Result<Self, ServerError> {
        let synthesizer = DeepgramSynthesizer::new(settings.synthesis.clone())?;
        let backend = OpenAIBackend::new(settings.completion.clone())?;

        let collaborators = Collaborators {
            recognizer: Arc::new(DeepgramRecognizer::new(settings.recognition.clone())),
            synthesizer: Arc::new(synthesizer),
            completion: Arc::new(OpenAIProvider::new(
                Arc::new(backend),
                settings.completion.clone(),
            )),
        };

        Ok(Self::new(settings, collaborators))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::from_settings(&self.settings)
    }
}

/// One open media stream
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCall {
    pub connection: u64,
    pub call_sid: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// Media streams currently connected
#[derive(Debug, Default)]
pub struct ActiveCalls {
    next_id: AtomicU64,
    calls: RwLock<HashMap<u64, ActiveCall>>,
}

impl ActiveCalls {
    /// Track a new connection and return its id
    pub fn register(&self) -> u64 {
        let connection = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.calls.write().insert(
            connection,
            ActiveCall {
                connection,
                call_sid: None,
                connected_at: Utc::now(),
            },
        );
        connection
    }

    /// Attach the carrier's call id once the stream starts
    pub fn identify(&self, connection: u64, call_sid: &str) {
        if let Some(call) = self.calls.write().get_mut(&connection) {
            call.call_sid = Some(call_sid.to_string());
        }
    }

    pub fn remove(&self, connection: u64) {
        self.calls.write().remove(&connection);
    }

    pub fn len(&self) -> usize {
        self.calls.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Oldest first
    pub fn snapshot(&self) -> Vec<ActiveCall> {
        let mut calls: Vec<ActiveCall> = self.calls.read().values().cloned().collect();
        calls.sort_by_key(|call| call.connection);
        calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_calls() {
        let calls = ActiveCalls::default();
        let first = calls.register();
        let second = calls.register();
        assert_ne!(first, second);

        calls.identify(second, "CA2");
        let snapshot = calls.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].call_sid, None);
        assert_eq!(snapshot[1].call_sid.as_deref(), Some("CA2"));

        calls.remove(first);
        calls.remove(first);
        assert_eq!(calls.len(), 1);
    }
}
