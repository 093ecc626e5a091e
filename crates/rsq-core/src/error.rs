//! Queue error types.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors surfaced by the queue engine.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The durable store rejected a command or is unreachable.
    #[error("Store error: {0}")]
    Store(#[from] rsq_store::StoreError),

    /// `save()` could not persist the job. The pending order was rolled
    /// back; calling `save()` on the same builder again retries.
    #[error("Failed to save job '{job_id}': {reason}")]
    SaveFailed {
        /// Id of the job that was being saved.
        job_id: String,
        /// Underlying store failure.
        reason: String,
    },

    /// A job was created with an empty id.
    #[error("Invalid job id: id must be a non-empty string")]
    InvalidJobId,

    /// A job record could not be serialized or parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A completion or expiry handle was used a second time.
    #[error("Outcome already reported for job '{0}'")]
    AlreadyCompleted(String),

    /// `run()` was called while the loop is already active.
    #[error("Queue loop is already running")]
    AlreadyRunning,
}

impl QueueError {
    /// True when the loop may absorb the error and keep going.
    ///
    /// Store connectivity loss is survivable: reconciliation replays the
    /// durable truth once the store answers again. Everything else reflects
    /// caller misuse or corrupt data and is surfaced instead.
    pub fn is_recoverable(&self) -> bool {
        match self {
            QueueError::Store(e) => e.is_recoverable(),
            QueueError::SaveFailed { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_is_recoverable() {
        let error = QueueError::Store(rsq_store::StoreError::unavailable("down"));
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_save_failed_is_recoverable() {
        let error = QueueError::SaveFailed {
            job_id: "a".to_string(),
            reason: "store offline".to_string(),
        };
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_invalid_job_id_is_not_recoverable() {
        assert!(!QueueError::InvalidJobId.is_recoverable());
    }

    #[test]
    fn test_already_running_is_not_recoverable() {
        assert!(!QueueError::AlreadyRunning.is_recoverable());
    }

    #[test]
    fn test_save_failed_display_names_the_job() {
        let error = QueueError::SaveFailed {
            job_id: "order-7".to_string(),
            reason: "timeout".to_string(),
        };
        let text = error.to_string();
        assert!(text.contains("order-7"));
        assert!(text.contains("timeout"));
    }

    #[test]
    fn test_already_completed_display() {
        let error = QueueError::AlreadyCompleted("job-1".to_string());
        assert_eq!(error.to_string(), "Outcome already reported for job 'job-1'");
    }
}
