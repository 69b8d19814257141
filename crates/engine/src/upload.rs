//! Upload progress tracking.
//!
//! Upload progress comes from the transport's byte counters, not from
//! polling. The tracker turns `(sent, total)` pairs into a 0-100 value
//! that never decreases within one attempt and publishes it on a
//! [`watch`] channel.

use std::sync::Mutex;

use dubflow_core::upload::percent_of;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    InProgress,
    /// The last attempt failed; [`reset`](UploadProgressTracker::reset)
    /// is required before another.
    Failed,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("Upload failed at {percent}%: {message}")]
    Failed { percent: u8, message: String },

    #[error("Previous upload failed; reset before retrying")]
    ResetRequired,

    #[error("An upload is already in progress")]
    AlreadyInProgress,
}

#[derive(Debug)]
struct Inner {
    state: UploadState,
    percent: u8,
}

/// Tracks the percentage of one upload attempt at a time.
#[derive(Debug)]
pub struct UploadProgressTracker {
    inner: Mutex<Inner>,
    percent_tx: watch::Sender<u8>,
}

impl Default for UploadProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadProgressTracker {
    pub fn new() -> Self {
        let (percent_tx, _) = watch::channel(0);
        Self {
            inner: Mutex::new(Inner {
                state: UploadState::Idle,
                percent: 0,
            }),
            percent_tx,
        }
    }

    /// Subscribe to percentage updates.
    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.percent_tx.subscribe()
    }

    pub fn percent(&self) -> u8 {
        self.lock().percent
    }

    pub fn state(&self) -> UploadState {
        self.lock().state
    }

    /// Begin a new attempt at 0%.
    pub fn begin(&self) -> Result<(), UploadError> {
        let mut inner = self.lock();
        match inner.state {
            UploadState::Failed => return Err(UploadError::ResetRequired),
            UploadState::InProgress => return Err(UploadError::AlreadyInProgress),
            UploadState::Idle | UploadState::Done => {}
        }
        inner.state = UploadState::InProgress;
        inner.percent = 0;
        self.percent_tx.send_replace(0);
        Ok(())
    }

    /// Record a byte-progress event and return the current percentage.
    ///
    /// Events outside an attempt, and events that would move the value
    /// backwards, are ignored.
    pub fn record(&self, sent: u64, total: u64) -> u8 {
        let mut inner = self.lock();
        if inner.state != UploadState::InProgress {
            return inner.percent;
        }
        let percent = percent_of(sent, total);
        if percent > inner.percent {
            inner.percent = percent;
            self.percent_tx.send_replace(percent);
        }
        inner.percent
    }

    /// Mark the attempt as failed. The percentage is left where it was.
    pub fn fail(&self, message: impl Into<String>) -> UploadError {
        let mut inner = self.lock();
        inner.state = UploadState::Failed;
        UploadError::Failed {
            percent: inner.percent,
            message: message.into(),
        }
    }

    /// Mark the attempt as complete at 100%.
    pub fn finish(&self) {
        let mut inner = self.lock();
        inner.state = UploadState::Done;
        inner.percent = 100;
        self.percent_tx.send_replace(100);
    }

    /// Return to idle at 0%, clearing a failure.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = UploadState::Idle;
        inner.percent = 0;
        self.percent_tx.send_replace(0);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn progress_is_monotonic_within_an_attempt() {
        let tracker = UploadProgressTracker::new();
        tracker.begin().unwrap();

        assert_eq!(tracker.record(30, 100), 30);
        assert_eq!(tracker.record(20, 100), 30);
        assert_eq!(tracker.record(75, 100), 75);
        assert_eq!(tracker.percent(), 75);
    }

    #[test]
    fn new_attempt_starts_at_zero() {
        let tracker = UploadProgressTracker::new();
        tracker.begin().unwrap();
        tracker.record(100, 100);
        tracker.finish();
        assert_eq!(tracker.state(), UploadState::Done);

        tracker.begin().unwrap();
        assert_eq!(tracker.percent(), 0);
    }

    #[test]
    fn failure_keeps_value_and_requires_reset() {
        let tracker = UploadProgressTracker::new();
        tracker.begin().unwrap();
        tracker.record(40, 100);

        let err = tracker.fail("connection reset");
        assert_matches!(err, UploadError::Failed { percent: 40, .. });
        assert_eq!(tracker.percent(), 40);
        assert_eq!(tracker.begin(), Err(UploadError::ResetRequired));

        tracker.reset();
        assert_eq!(tracker.percent(), 0);
        assert!(tracker.begin().is_ok());
    }

    #[test]
    fn events_outside_an_attempt_are_ignored() {
        let tracker = UploadProgressTracker::new();
        assert_eq!(tracker.record(50, 100), 0);
        assert_eq!(tracker.state(), UploadState::Idle);
    }

    #[test]
    fn concurrent_attempts_are_rejected() {
        let tracker = UploadProgressTracker::new();
        tracker.begin().unwrap();
        assert_eq!(tracker.begin(), Err(UploadError::AlreadyInProgress));
    }

    #[tokio::test]
    async fn subscribers_see_latest_percent() {
        let tracker = UploadProgressTracker::new();
        let mut rx = tracker.subscribe();
        tracker.begin().unwrap();
        tracker.record(1, 4);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 25);

        tracker.finish();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 100);
    }
}
