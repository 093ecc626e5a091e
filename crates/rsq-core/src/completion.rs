//! Completion and expiry-acknowledgment handles.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::error::{QueueError, QueueResult};

/// Outcome a handler reports for a dispatched job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The work finished; the job is removed.
    Success,
    /// The work failed; the job goes through the retry policy.
    Failure,
}

/// Single-use reply handle delivered with a `processing` event.
///
/// Exactly one `complete()` call wins. Later calls, from this handle or any
/// clone of it, return [`QueueError::AlreadyCompleted`] and the first
/// outcome stands. Dropping every clone without completing reads as
/// [`Outcome::Failure`] on the scheduler side, so a handler that forgets to
/// answer cannot wedge the loop.
#[derive(Clone)]
pub struct CompletionHandle {
    job_id: String,
    tx: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

impl CompletionHandle {
    /// Create a handle and the receiver the scheduler waits on.
    pub(crate) fn new(job_id: impl Into<String>) -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            job_id: job_id.into(),
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        (handle, rx)
    }

    /// Report the job's outcome. The first call wins.
    pub fn complete(&self, outcome: Outcome) -> QueueResult<()> {
        let tx = self.tx.lock().take();
        match tx {
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    warn!(
                        job_id = %self.job_id,
                        "Outcome reported after the queue loop stopped"
                    );
                }
                Ok(())
            }
            None => Err(QueueError::AlreadyCompleted(self.job_id.clone())),
        }
    }

    /// Shorthand for `complete(Outcome::Success)`.
    pub fn success(&self) -> QueueResult<()> {
        self.complete(Outcome::Success)
    }

    /// Shorthand for `complete(Outcome::Failure)`.
    pub fn failure(&self) -> QueueResult<()> {
        self.complete(Outcome::Failure)
    }

    /// The job this handle answers for.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl std::fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}

/// Removal decision sent back to the scheduler by an expiry listener.
#[derive(Debug)]
pub(crate) struct ExpiryDecision {
    pub(crate) job_id: String,
    pub(crate) remove: bool,
}

/// Single-use acknowledgment handle delivered with an `expired` event.
///
/// The scheduler does not wait for the acknowledgment; it keeps cycling and
/// the expired job surfaces again on every pass until `ack(true)` removes
/// it. The decision travels over the scheduler's command channel and is
/// applied when the loop next looks at its inbox.
#[derive(Clone)]
pub struct ExpiryAck {
    job_id: String,
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<ExpiryDecision>>>>,
}

impl ExpiryAck {
    pub(crate) fn new(
        job_id: impl Into<String>,
        tx: mpsc::UnboundedSender<ExpiryDecision>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Confirm (`true`) or decline (`false`) removal of the expired job.
    /// The first call wins.
    pub fn ack(&self, remove: bool) -> QueueResult<()> {
        let tx = self.tx.lock().take();
        match tx {
            Some(tx) => {
                let decision = ExpiryDecision {
                    job_id: self.job_id.clone(),
                    remove,
                };
                if tx.send(decision).is_err() {
                    warn!(
                        job_id = %self.job_id,
                        "Expiry acknowledged after the queue loop stopped"
                    );
                }
                Ok(())
            }
            None => Err(QueueError::AlreadyCompleted(self.job_id.clone())),
        }
    }

    /// The job this handle answers for.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl std::fmt::Debug for ExpiryAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryAck")
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_completion_wins() {
        let (handle, rx) = CompletionHandle::new("a");

        handle.success().expect("first completion");
        assert_eq!(rx.await.expect("outcome"), Outcome::Success);
    }

    #[test]
    fn test_receiver_pends_until_completion() {
        let (handle, rx) = CompletionHandle::new("a");
        let mut rx = tokio_test::task::spawn(rx);

        tokio_test::assert_pending!(rx.poll());
        handle.failure().expect("complete");

        let outcome = tokio_test::assert_ready!(rx.poll()).expect("outcome");
        assert_eq!(outcome, Outcome::Failure);
    }

    #[tokio::test]
    async fn test_second_completion_is_rejected() {
        let (handle, _rx) = CompletionHandle::new("a");

        handle.failure().expect("first completion");
        let error = handle.success().expect_err("second completion");
        assert!(matches!(error, QueueError::AlreadyCompleted(id) if id == "a"));
    }

    #[tokio::test]
    async fn test_clones_share_the_single_use() {
        let (handle, rx) = CompletionHandle::new("a");
        let clone = handle.clone();

        clone.success().expect("clone completes");
        assert!(handle.failure().is_err());
        assert_eq!(rx.await.expect("outcome"), Outcome::Success);
    }

    #[tokio::test]
    async fn test_dropping_every_clone_closes_the_channel() {
        let (handle, rx) = CompletionHandle::new("a");
        let clone = handle.clone();
        drop(handle);
        drop(clone);

        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_completion_after_loop_shutdown_is_not_an_error() {
        let (handle, rx) = CompletionHandle::new("a");
        drop(rx);

        handle.success().expect("completion still accepted");
    }

    #[tokio::test]
    async fn test_expiry_ack_delivers_decision() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ack = ExpiryAck::new("a", tx);

        ack.ack(true).expect("ack");
        let decision = rx.recv().await.expect("decision");
        assert_eq!(decision.job_id, "a");
        assert!(decision.remove);
    }

    #[tokio::test]
    async fn test_expiry_ack_is_single_use() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let ack = ExpiryAck::new("a", tx);

        ack.ack(false).expect("first ack");
        assert!(ack.ack(true).is_err());
    }
}
