//! Session registry
//!
//! Records calls whose media session committed a transfer so the carrier's
//! follow-up webhook can be routed to a human line. Entries are consumed
//! exactly once and expire after a TTL whether or not the webhook arrives.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Time source for expiry checks
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Runtime clock; follows paused time in tests
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct Entry {
    marked_at: Instant,
    expires_at: Instant,
    generation: u64,
    expiry: Option<JoinHandle<()>>,
}

/// Snapshot of a transfer waiting for its webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    pub call_sid: String,
    pub age: Duration,
}

pub struct SessionRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    generation: AtomicU64,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
            generation: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Record that `call_sid` is due for transfer
    ///
    /// Re-marking refreshes the TTL. Outside a runtime no cleanup task is
    /// scheduled and expiry is enforced lazily by [`consume`](Self::consume).
    pub fn mark_due(self: &Arc<Self>, call_sid: &str) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now();

        let expiry = Handle::try_current().ok().map(|handle| {
            let registry = Arc::downgrade(self);
            let call_sid = call_sid.to_string();
            let ttl = self.ttl;
            handle.spawn(async move {
                tokio::time::sleep(ttl).await;
                if let Some(registry) = registry.upgrade() {
                    registry.expire_generation(&call_sid, generation);
                }
            })
        });

        let previous = self.entries.lock().insert(
            call_sid.to_string(),
            Entry {
                marked_at: now,
                expires_at: now + self.ttl,
                generation,
                expiry,
            },
        );

        if let Some(handle) = previous.and_then(|entry| entry.expiry) {
            handle.abort();
        }

        tracing::info!(call_sid = %call_sid, ttl_ms = self.ttl.as_millis() as u64, "Transfer due");
    }

    /// Atomically test and clear the transfer flag
    ///
    /// Of any number of concurrent callers for the same call, at most one
    /// sees `true`. An entry past its TTL is removed and reported absent.
    pub fn consume(&self, call_sid: &str) -> bool {
        let Some(entry) = self.entries.lock().remove(call_sid) else {
            return false;
        };

        if let Some(handle) = entry.expiry {
            handle.abort();
        }

        let live = self.clock.now() < entry.expires_at;
        if !live {
            tracing::debug!(call_sid = %call_sid, "Transfer entry expired before use");
        }
        live
    }

    /// Drop an entry; no-op when absent
    pub fn expire(&self, call_sid: &str) {
        if let Some(handle) = self
            .entries
            .lock()
            .remove(call_sid)
            .and_then(|entry| entry.expiry)
        {
            handle.abort();
        }
    }

    fn expire_generation(&self, call_sid: &str, generation: u64) {
        let mut entries = self.entries.lock();
        if entries
            .get(call_sid)
            .is_some_and(|entry| entry.generation == generation)
        {
            entries.remove(call_sid);
            tracing::debug!(call_sid = %call_sid, "Transfer entry expired");
        }
    }

    /// Unexpired entries, oldest first
    pub fn pending(&self) -> Vec<PendingTransfer> {
        let now = self.clock.now();
        let mut pending: Vec<PendingTransfer> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| now < entry.expires_at)
            .map(|(call_sid, entry)| PendingTransfer {
                call_sid: call_sid.clone(),
                age: now.saturating_duration_since(entry.marked_at),
            })
            .collect();
        pending.sort_by(|a, b| b.age.cmp(&a.age));
        pending
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}
