//! Fluent construction of jobs prior to persistence.

use std::sync::Arc;

use tracing::{debug, error};

use crate::error::{QueueError, QueueResult};
use crate::events::QueueEvent;
use crate::job::{epoch_ms, JobOptions, JobRecord};
use crate::metrics::QueueMetrics;
use crate::queue::QueueCore;

/// Builder returned by [`Queue::create_job`](crate::Queue::create_job).
///
/// Option setters chain and the last call per option wins. Nothing touches
/// the store until [`save`](JobBuilder::save); the builder survives a
/// failed save, so calling `save()` again simply retries.
pub struct JobBuilder {
    core: Arc<QueueCore>,
    job_id: String,
    data: String,
    opt: JobOptions,
}

impl JobBuilder {
    pub(crate) fn new(
        core: Arc<QueueCore>,
        job_id: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            core,
            job_id: job_id.into(),
            data: data.into(),
            opt: JobOptions::default(),
        }
    }

    /// Set the retry budget; `-1` means unlimited.
    pub fn retries(mut self, retries: i64) -> Self {
        self.opt.retries = retries;
        self
    }

    /// Delay the first attempt by `ms` milliseconds; `-1` restores the
    /// queue's debounce default.
    pub fn delay_until(mut self, ms: i64) -> Self {
        self.opt.delay_until = ms;
        self
    }

    /// Expire the job `ms_from_now` milliseconds from now; `-1` removes
    /// the deadline. The stored value is absolute, so it keeps meaning the
    /// same instant across process restarts.
    pub fn expired_time(mut self, ms_from_now: i64) -> Self {
        self.opt.expired_time = if ms_from_now == -1 {
            -1
        } else {
            epoch_ms() + ms_from_now
        };
        self
    }

    /// Persist the job and append it to the pending order.
    ///
    /// Emits `new` on success. On store failure the id is rolled back out
    /// of the pending order and [`QueueError::SaveFailed`] is returned. A
    /// scheduling pass is triggered either way, so the loop always
    /// re-evaluates against the store's current contents.
    pub async fn save(&self) -> QueueResult<()> {
        let result = self.persist().await;
        self.core.wake();
        result
    }

    async fn persist(&self) -> QueueResult<()> {
        if self.job_id.is_empty() {
            error!(queue = %self.core.name(), "Rejected job with empty id");
            return Err(QueueError::InvalidJobId);
        }

        let record = JobRecord {
            data: self.data.clone(),
            opt: self.opt,
        };
        let serialized = record.to_json()?;

        let written = self
            .core
            .store()
            .hash_set(self.core.keys().jobs(), &self.job_id, &serialized)
            .await;

        match written {
            Ok(()) => {
                self.core.state().lock().push(self.job_id.clone());
                self.core.record_depth();
                QueueMetrics::job_saved(self.core.name());
                debug!(queue = %self.core.name(), job_id = %self.job_id, "Job saved");
                self.core.emit(QueueEvent::New {
                    job_id: self.job_id.clone(),
                    record,
                });
                Ok(())
            }
            Err(e) => {
                // A failed save must leave no trace in the pending order.
                self.core.state().lock().remove(&self.job_id);
                QueueMetrics::save_failed(self.core.name());
                error!(
                    queue = %self.core.name(),
                    job_id = %self.job_id,
                    error = %e,
                    "Failed to save job"
                );
                Err(QueueError::SaveFailed {
                    job_id: self.job_id.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// The id this builder saves under.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// The options as currently configured.
    pub fn options(&self) -> &JobOptions {
        &self.opt
    }
}
