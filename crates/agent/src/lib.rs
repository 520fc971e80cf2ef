//! Call orchestration
//!
//! Features:
//! - One event-driven session per carrier media stream
//! - Transfer handshake with settle and fallback timers
//! - Process-wide registry of calls due for transfer

pub mod handshake;
pub mod registry;
pub mod session;
pub mod telemetry;
pub mod timer;

pub use handshake::{CommitReason, TransferHandshake, TransferState};
pub use registry::{Clock, PendingTransfer, SessionRegistry, SystemClock};
pub use session::{
    CallSession, Collaborators, SessionConfig, SessionEvent, SessionOutcome, StreamSink,
};
pub use timer::SessionTimer;
