//! Cancellable session timers
//!
//! A timer posts an event carrying its generation into the session queue.
//! Re-arming or cancelling bumps the generation, so an event that was
//! already queued when the timer was replaced is recognized as stale.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct SessionTimer {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl SessionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any armed timer with one firing after `after`
    pub fn arm<E, F>(&mut self, after: Duration, events: &mpsc::Sender<E>, make: F)
    where
        E: Send + 'static,
        F: FnOnce(u64) -> E + Send + 'static,
    {
        self.cancel();
        let generation = self.generation;
        let events = events.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(make(generation)).await;
        }));
    }

    pub fn cancel(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Accept a fired event if it belongs to the armed timer
    pub fn fired(&mut self, generation: u64) -> bool {
        if self.handle.is_none() || generation != self.generation {
            return false;
        }
        self.handle = None;
        true
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_once() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut timer = SessionTimer::new();
        timer.arm(Duration::from_millis(100), &tx, |generation| generation);
        assert!(timer.is_armed());

        let generation = rx.recv().await.unwrap();
        assert!(timer.fired(generation));
        assert!(!timer.fired(generation));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_invalidates_queued_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut timer = SessionTimer::new();
        timer.arm(Duration::from_millis(100), &tx, |generation| generation);

        tokio::time::sleep(Duration::from_millis(150)).await;
        // first event is already queued when the timer is replaced
        timer.arm(Duration::from_millis(100), &tx, |generation| generation);

        let stale = rx.recv().await.unwrap();
        assert!(!timer.fired(stale));
        let fresh = rx.recv().await.unwrap();
        assert!(timer.fired(fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let (tx, mut rx) = mpsc::channel::<u64>(4);
        let mut timer = SessionTimer::new();
        timer.arm(Duration::from_millis(100), &tx, |generation| generation);
        timer.cancel();
        drop(tx);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.recv().await.is_none());
    }
}
