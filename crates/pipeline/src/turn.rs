//! Turn aggregation
//!
//! Turns streaming recognition text into caller turns. Input is only
//! accepted while the answer gate is open, which the session opens each
//! time it asks the caller a question. Interim text is debounced by a
//! quiet period owned by the caller of this type; final text flushes at
//! once.

use call_intake_core::CallerTurn;

/// Result of feeding an interim transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterimOutcome {
    /// Gate closed or text too short; nothing changed
    Ignored,
    /// Buffer replaced. The quiet timer must be restarted.
    Buffered {
        /// Caller is talking over queued audio that should be cleared
        interrupt: bool,
    },
}

/// Converts interim/final recognition text into discrete caller turns
#[derive(Debug, Default)]
pub struct TurnAggregator {
    waiting_for_answer: bool,
    buffer: String,
    last_turn: Option<String>,
    interaction: u32,
}

impl TurnAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_waiting_for_answer(&self) -> bool {
        self.waiting_for_answer
    }

    /// Number of turns emitted so far
    pub fn interaction(&self) -> u32 {
        self.interaction
    }

    /// Text waiting for the quiet period to elapse
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Start accepting an answer. Clears anything left in the buffer.
    pub fn open_gate(&mut self) {
        self.waiting_for_answer = true;
        self.buffer.clear();
    }

    /// Stop accepting input and drop the buffer
    pub fn close_gate(&mut self) {
        self.waiting_for_answer = false;
        self.buffer.clear();
    }

    pub fn on_interim(&mut self, text: &str, audio_in_flight: bool) -> InterimOutcome {
        if !self.waiting_for_answer {
            return InterimOutcome::Ignored;
        }

        let text = text.trim();
        if text.chars().count() <= 1 {
            return InterimOutcome::Ignored;
        }

        self.buffer = text.to_string();

        let repeats_last = self
            .last_turn
            .as_deref()
            .is_some_and(|last| is_near_duplicate(text, last));

        InterimOutcome::Buffered {
            interrupt: audio_in_flight && !repeats_last,
        }
    }

    /// Provider-confirmed text flushes immediately
    pub fn on_final(&mut self, text: &str) -> Option<CallerTurn> {
        if !self.waiting_for_answer {
            return None;
        }

        let text = text.trim();
        if text.chars().count() <= 1 {
            return None;
        }

        self.buffer = text.to_string();
        self.flush()
    }

    pub fn on_quiet_elapsed(&mut self) -> Option<CallerTurn> {
        if !self.waiting_for_answer {
            return None;
        }
        self.flush()
    }

    fn flush(&mut self) -> Option<CallerTurn> {
        let text = self.buffer.trim().to_string();

        if text.chars().count() <= 1 {
            self.buffer.clear();
            return None;
        }

        if let Some(last) = &self.last_turn {
            if is_near_duplicate(&text, last) {
                tracing::debug!(text = %text, "Dropping repeated transcription");
                self.buffer.clear();
                return None;
            }
        }

        let turn = CallerTurn::new(text.clone(), self.interaction);
        self.interaction += 1;
        self.last_turn = Some(text);
        self.close_gate();

        Some(turn)
    }
}

/// Length difference up to which two strings are compared position by position
const COMPARABLE_LENGTH_SLACK: usize = 2;

/// Whether two transcriptions are the same utterance
///
/// Case-insensitive trimmed equality; containment once both are at least
/// four characters; or at most two differing characters over the shared
/// prefix for strings of comparable length.
pub fn is_near_duplicate(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a == b {
        return true;
    }

    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len < 4 || b_len < 4 {
        return false;
    }

    if a.contains(&b) || b.contains(&a) {
        return true;
    }

    if a_len.abs_diff(b_len) > COMPARABLE_LENGTH_SLACK {
        return false;
    }

    let mismatches = a.chars().zip(b.chars()).filter(|(x, y)| x != y).count();
    mismatches <= 2
}
