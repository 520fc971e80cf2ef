//! Transfer handshake
//!
//! Once the model asks for a transfer, the caller should hear the transfer
//! line before the stream closes, but the transfer must be recorded no
//! matter what happens to that audio.
//!
//! ```text
//! Idle ──begin──▶ Pending ──audio sent──▶ MessagePlayed ──mark + settle──▶ Committed
//!                    │                         │
//!                    ├── synthesis failure ────┼──────────────────────────▶ Committed
//!                    ├── fallback elapsed ─────┤
//!                    └── disconnect ───────────┘
//! ```
//!
//! The state machine is pure; the session owns the timers and performs the
//! side effects whenever a transition reports a [`CommitReason`]. A commit
//! is reported exactly once.

use call_intake_core::TransferTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Pending,
    MessagePlayed,
    Committed,
}

/// Why a transfer was committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitReason {
    /// Carrier confirmed the transfer line played
    MessagePlayed,
    /// Playback was never confirmed in time
    FallbackTimeout,
    /// The transfer line could not be synthesized
    SynthesisFailure,
    /// Caller or carrier hung up mid-handshake
    Disconnected,
}

impl CommitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitReason::MessagePlayed => "message_played",
            CommitReason::FallbackTimeout => "fallback_timeout",
            CommitReason::SynthesisFailure => "synthesis_failure",
            CommitReason::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for CommitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct TransferHandshake {
    state: TransferState,
    label: Option<String>,
    target: Option<TransferTarget>,
    settle_armed: bool,
    reason: Option<CommitReason>,
}

impl Default for TransferHandshake {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferHandshake {
    pub fn new() -> Self {
        Self {
            state: TransferState::Idle,
            label: None,
            target: None,
            settle_armed: false,
            reason: None,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Mark label of the transfer line, once a transfer has begun
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn target(&self) -> Option<TransferTarget> {
        self.target
    }

    pub fn reason(&self) -> Option<CommitReason> {
        self.reason
    }

    /// New replies are only played while no transfer is in progress
    pub fn accepts_replies(&self) -> bool {
        self.state == TransferState::Idle
    }

    /// Start a transfer and mint the mark label for its spoken line
    ///
    /// Returns `None` if a transfer already began.
    pub fn begin(&mut self, target: TransferTarget) -> Option<String> {
        if self.state != TransferState::Idle {
            return None;
        }

        let label = format!("transfer-{}", uuid::Uuid::new_v4());
        self.state = TransferState::Pending;
        self.label = Some(label.clone());
        self.target = Some(target);
        tracing::info!(target = target.as_str(), label = %label, "Transfer pending");
        Some(label)
    }

    /// Audio for `label` was handed to the transport
    pub fn on_audio_sent(&mut self, label: &str) -> bool {
        if self.state == TransferState::Pending && self.is_transfer_label(label) {
            self.state = TransferState::MessagePlayed;
            return true;
        }
        false
    }

    /// Carrier acknowledged a mark
    ///
    /// Returns true when the settle timer should replace the fallback.
    pub fn on_mark(&mut self, label: &str) -> bool {
        let in_flight = matches!(
            self.state,
            TransferState::Pending | TransferState::MessagePlayed
        );
        if !in_flight || self.settle_armed || !self.is_transfer_label(label) {
            return false;
        }

        self.state = TransferState::MessagePlayed;
        self.settle_armed = true;
        true
    }

    pub fn on_settle_elapsed(&mut self) -> Option<CommitReason> {
        if !self.settle_armed {
            return None;
        }
        self.commit(CommitReason::MessagePlayed)
    }

    pub fn on_fallback_elapsed(&mut self) -> Option<CommitReason> {
        if self.settle_armed {
            return None;
        }
        self.commit(CommitReason::FallbackTimeout)
    }

    /// Synthesis failed while the transfer line was still pending
    pub fn on_synthesis_failure(&mut self) -> Option<CommitReason> {
        if self.state != TransferState::Pending {
            return None;
        }
        self.commit(CommitReason::SynthesisFailure)
    }

    pub fn on_disconnect(&mut self) -> Option<CommitReason> {
        self.commit(CommitReason::Disconnected)
    }

    fn commit(&mut self, reason: CommitReason) -> Option<CommitReason> {
        match self.state {
            TransferState::Pending | TransferState::MessagePlayed => {
                self.state = TransferState::Committed;
                self.reason = Some(reason);
                Some(reason)
            }
            TransferState::Idle | TransferState::Committed => None,
        }
    }

    fn is_transfer_label(&self, label: &str) -> bool {
        self.label.as_deref() == Some(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> (TransferHandshake, String) {
        let mut handshake = TransferHandshake::new();
        let label = handshake.begin(TransferTarget::Attorney).unwrap();
        (handshake, label)
    }

    #[test]
    fn test_begin_once() {
        let (mut handshake, label) = pending();
        assert!(label.starts_with("transfer-"));
        assert_eq!(handshake.state(), TransferState::Pending);
        assert!(!handshake.accepts_replies());
        assert_eq!(handshake.begin(TransferTarget::MainLine), None);
        assert_eq!(handshake.target(), Some(TransferTarget::Attorney));
    }

    #[test]
    fn test_played_then_settled() {
        let (mut handshake, label) = pending();

        assert!(!handshake.on_audio_sent("reply-0"));
        assert!(handshake.on_audio_sent(&label));
        assert_eq!(handshake.state(), TransferState::MessagePlayed);

        assert!(!handshake.on_mark("reply-0"));
        assert!(handshake.on_mark(&label));
        // repeated acknowledgement does not re-arm
        assert!(!handshake.on_mark(&label));

        assert_eq!(handshake.on_fallback_elapsed(), None);
        assert_eq!(handshake.on_settle_elapsed(), Some(CommitReason::MessagePlayed));
        assert_eq!(handshake.state(), TransferState::Committed);
        assert_eq!(handshake.on_disconnect(), None);
    }

    #[test]
    fn test_fallback_commit() {
        let (mut handshake, label) = pending();
        assert!(handshake.on_audio_sent(&label));
        assert_eq!(handshake.on_settle_elapsed(), None);
        assert_eq!(handshake.on_fallback_elapsed(), Some(CommitReason::FallbackTimeout));
        assert_eq!(handshake.on_fallback_elapsed(), None);
        assert_eq!(handshake.reason(), Some(CommitReason::FallbackTimeout));
    }

    #[test]
    fn test_synthesis_failure_only_while_pending() {
        let (mut handshake, _) = pending();
        assert_eq!(
            handshake.on_synthesis_failure(),
            Some(CommitReason::SynthesisFailure)
        );

        let (mut handshake, label) = pending();
        handshake.on_audio_sent(&label);
        assert_eq!(handshake.on_synthesis_failure(), None);
        assert_eq!(handshake.state(), TransferState::MessagePlayed);
    }

    #[test]
    fn test_disconnect_commits_once() {
        let mut idle = TransferHandshake::new();
        assert_eq!(idle.on_disconnect(), None);
        assert!(idle.accepts_replies());

        let (mut handshake, label) = pending();
        handshake.on_audio_sent(&label);
        assert!(handshake.on_mark(&label));
        assert_eq!(handshake.on_disconnect(), Some(CommitReason::Disconnected));
        assert_eq!(handshake.on_settle_elapsed(), None);
    }

    #[test]
    fn test_mark_before_audio_report() {
        let (mut handshake, label) = pending();
        assert!(handshake.on_mark(&label));
        assert_eq!(handshake.state(), TransferState::MessagePlayed);
        assert!(!handshake.on_audio_sent(&label));
        assert_eq!(handshake.on_settle_elapsed(), Some(CommitReason::MessagePlayed));
    }
}
