//! Progress reporting handle.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A single progress update emitted at a stage boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressUpdate {
    pub run_id: String,
    pub stage: String,
    pub action: String,
    pub percent: u8,
}

/// Handle for emitting progress updates to the caller.
///
/// Cheaply cloneable and safe to invoke from any task. Updates are sent
/// through an async channel; if the caller's buffer is full or the
/// receiver is gone, the update is dropped and logged; progress
/// reporting must never stall or fail the pipeline.
#[derive(Clone)]
pub struct ProgressHandle {
    tx: mpsc::Sender<ProgressUpdate>,
}

impl ProgressHandle {
    /// Create a handle and the receiver the caller polls.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    /// Wrap an existing sender.
    pub fn new(tx: mpsc::Sender<ProgressUpdate>) -> Self {
        Self { tx }
    }

    /// Emit an update without blocking. Returns true if it was delivered.
    pub fn emit(&self, update: ProgressUpdate) -> bool {
        match self.tx.try_send(update) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Dropped progress update: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(percent: u8) -> ProgressUpdate {
        ProgressUpdate {
            run_id: "run-1".to_string(),
            stage: "forecasting".to_string(),
            action: "Forecasting".to_string(),
            percent,
        }
    }

    #[tokio::test]
    async fn test_emit_delivers_update() {
        let (handle, mut rx) = ProgressHandle::channel(4);
        assert!(handle.emit(update(10)));

        let received = rx.recv().await.expect("should receive update");
        assert_eq!(received.percent, 10);
    }

    #[test]
    fn test_emit_full_buffer_drops_without_panic() {
        let (handle, _rx) = ProgressHandle::channel(1);
        assert!(handle.emit(update(10)));
        assert!(!handle.emit(update(40)));
    }

    #[test]
    fn test_emit_closed_channel_drops_without_panic() {
        let (handle, rx) = ProgressHandle::channel(1);
        drop(rx);
        assert!(!handle.emit(update(10)));
    }

    #[tokio::test]
    async fn test_cloned_handles_share_channel() {
        let (handle, mut rx) = ProgressHandle::channel(4);
        let clone = handle.clone();

        handle.emit(update(10));
        clone.emit(update(40));

        assert_eq!(rx.recv().await.unwrap().percent, 10);
        assert_eq!(rx.recv().await.unwrap().percent, 40);
    }
}
