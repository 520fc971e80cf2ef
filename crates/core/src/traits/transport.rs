//! Outbound carrier transport

use crate::Result;

/// Outbound half of a carrier media stream
///
/// Calls are synchronous and non-blocking; a closed sink fails every send
/// with `Error::TransportUnavailable`.
pub trait MediaSink: Send + Sync {
    fn is_open(&self) -> bool;

    /// Queue raw audio for playback
    fn send_media(&self, audio: &[u8]) -> Result<()>;

    /// Queue a marker the carrier echoes back once playback reaches it
    fn send_mark(&self, label: &str) -> Result<()>;

    /// Drop any queued audio (barge-in)
    fn send_clear(&self) -> Result<()>;

    /// Close the stream. Further sends fail.
    fn close(&self, code: u16, reason: &str) -> Result<()>;
}
