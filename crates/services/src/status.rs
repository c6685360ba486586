use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::warn;

use crate::error::SyncError;

/// The single current error value shown to the user.
///
/// Every report replaces the current value and bumps a counter, so bulk
/// operations that fail several times are still visible one report at a time
/// to subscribers.
#[derive(Debug)]
pub struct StatusBoard {
    current: watch::Sender<Option<SyncError>>,
    reports: AtomicU64,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    #[must_use]
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            reports: AtomicU64::new(0),
        }
    }

    pub fn report(&self, error: SyncError) {
        warn!(error = %error, "sync failure");
        self.reports.fetch_add(1, Ordering::Relaxed);
        self.current.send_replace(Some(error));
    }

    pub fn clear(&self) {
        self.current.send_if_modified(|current| current.take().is_some());
    }

    #[must_use]
    pub fn current(&self) -> Option<SyncError> {
        self.current.borrow().clone()
    }

    /// Total failures reported since creation.
    #[must_use]
    pub fn report_count(&self) -> u64 {
        self.reports.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<SyncError>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_latest_error_and_clear() {
        let board = StatusBoard::new();
        let mut rx = board.subscribe();

        board.report(SyncError::ReadOnly);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(SyncError::ReadOnly));

        board.clear();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
        assert_eq!(board.report_count(), 1);
    }

    #[test]
    fn clearing_empty_board_does_not_notify() {
        let board = StatusBoard::new();
        let rx = board.subscribe();
        board.clear();
        assert!(!rx.has_changed().unwrap());
        assert!(board.current().is_none());
    }
}
