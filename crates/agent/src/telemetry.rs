//! Per-call counters

use crate::handshake::CommitReason;

pub const CALLER_TURNS: &str = "intake_caller_turns_total";
pub const SYNTHESIS_FAILURES: &str = "intake_synthesis_failures_total";
pub const RECOGNITION_FAILURES: &str = "intake_recognition_failures_total";
pub const TRANSFERS_COMMITTED: &str = "intake_transfers_committed_total";

pub fn record_caller_turn() {
    metrics::counter!(CALLER_TURNS).increment(1);
}

pub fn record_synthesis_failure() {
    metrics::counter!(SYNTHESIS_FAILURES).increment(1);
}

pub fn record_recognition_failure() {
    metrics::counter!(RECOGNITION_FAILURES).increment(1);
}

pub fn record_transfer_commit(reason: CommitReason) {
    metrics::counter!(TRANSFERS_COMMITTED, "reason" => reason.as_str()).increment(1);
}
