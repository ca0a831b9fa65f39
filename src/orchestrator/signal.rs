use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation flag. Checked at iteration boundaries and awaited
/// while the session waits on a human.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        loop {
            // Registered before the check so a concurrent cancel is not missed.
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clones_share_the_flag() {
        let handle = CancelHandle::new();
        let remote = handle.clone();
        assert!(!handle.is_cancelled());

        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let handle = CancelHandle::new();
        let remote = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            remote.cancel();
        });

        tokio::time::timeout(Duration::from_secs(2), handle.cancelled())
            .await
            .unwrap();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_returns_when_already_set() {
        let handle = CancelHandle::new();
        handle.cancel();
        tokio::time::timeout(Duration::from_millis(100), handle.cancelled())
            .await
            .unwrap();
    }
}
