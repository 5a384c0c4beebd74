//! In-flight connection accounting for graceful shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Tracks active connections so the listener can drain on stop.
#[derive(Clone, Default)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    zero_notify: Arc<Notify>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one connection until the returned guard drops.
    pub fn guard(&self) -> ConnectionGuard {
        self.active.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            tracker: self.clone(),
        }
    }

    fn release(&self) {
        if self.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.zero_notify.notify_waiters();
        }
    }

    pub fn count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Wait until no connection is active. `false` on timeout.
    pub async fn wait_for_zero(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                // Register before checking so a release in between is not missed.
                let notified = self.zero_notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

/// Decrements the connection count on drop.
pub struct ConnectionGuard {
    tracker: ConnectionTracker,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_tracker_drains_immediately() {
        let tracker = ConnectionTracker::new();
        assert!(tracker.wait_for_zero(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn waits_for_last_guard() {
        let tracker = ConnectionTracker::new();
        let first = tracker.guard();
        let second = tracker.guard();
        assert_eq!(tracker.count(), 2);

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_for_zero(Duration::from_secs(5)).await })
        };
        drop(first);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(second);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn gives_up_after_timeout() {
        let tracker = ConnectionTracker::new();
        let _held = tracker.guard();
        assert!(!tracker.wait_for_zero(Duration::from_millis(20)).await);
        assert_eq!(tracker.count(), 1);
    }
}
