//! The timer-driven scheduling and processing loop.
//!
//! One scheduler drives one queue. Every pass looks only at the head of
//! the pending order, re-reads that job's record from the store (the store
//! owns the truth for retry budgets and deadlines), waits out the job's
//! delay, and then either consumes, expires or dispatches it. Failed
//! dispatches rotate the head to the tail so the rest of the queue keeps
//! moving.
//!
//! Store trouble never kills the loop: any command failure drops the
//! scheduler back into a probe cycle, and a successful probe rebuilds the
//! pending order from the jobs-hash before dispatch resumes.

use std::sync::Arc;
use std::time::Duration;

use rsq_store::StoreError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::completion::{CompletionHandle, ExpiryAck, ExpiryDecision, Outcome};
use crate::config::QueueConfig;
use crate::events::QueueEvent;
use crate::job::{epoch_ms, JobOptions, JobRecord};
use crate::metrics::QueueMetrics;
use crate::queue::QueueCore;

/// What one scheduling pass decided about the next step.
enum Tick {
    /// Re-evaluate the head immediately.
    Continue,
    /// Nothing to do until an external signal arrives.
    Idle,
    /// A store command failed; fall back to the probe cycle.
    Disconnected,
    /// Shutdown was requested.
    Stop,
}

/// How a dispatch timer ended.
enum Wait {
    /// The timer ran out; proceed with the head.
    Fired,
    /// The queue changed under us; start a fresh pass.
    Restart,
    /// Shutdown was requested.
    Stop,
}

/// The scheduling loop behind a queue.
///
/// Owns the timer state and the expiry-ack inbox. Exactly one scheduler
/// drives a queue at a time; `Queue::run` enforces that.
pub(crate) struct Scheduler {
    core: Arc<QueueCore>,
    ack_rx: mpsc::UnboundedReceiver<ExpiryDecision>,
    shutdown_rx: broadcast::Receiver<()>,
    /// The next dispatch after a failure waits out the retry delay
    /// instead of the debounce.
    after_failure: bool,
}

impl Scheduler {
    pub(crate) fn new(
        core: Arc<QueueCore>,
        ack_rx: mpsc::UnboundedReceiver<ExpiryDecision>,
    ) -> Self {
        let shutdown_rx = core.subscribe_shutdown();
        Self {
            core,
            ack_rx,
            shutdown_rx,
            after_failure: false,
        }
    }

    /// Hand the expiry-ack inbox back so the queue can be run again.
    pub(crate) fn into_ack_rx(self) -> mpsc::UnboundedReceiver<ExpiryDecision> {
        self.ack_rx
    }

    /// Drive the queue until shutdown.
    pub(crate) async fn run(&mut self) {
        info!(queue = %self.core.name(), "Queue loop starting");

        'outer: loop {
            // Probe until the store answers, then rebuild from it.
            if !self.connect_and_reconcile().await {
                break;
            }

            loop {
                match self.tick().await {
                    Tick::Continue => {}
                    Tick::Idle => {
                        if !self.wait_for_work().await {
                            break 'outer;
                        }
                    }
                    Tick::Disconnected => continue 'outer,
                    Tick::Stop => break 'outer,
                }
            }
        }

        info!(queue = %self.core.name(), "Queue loop stopped");
    }

    /// Probe store connectivity, then rebuild the pending order from the
    /// jobs-hash. Emits `store-connected` once per reconnect and `ready`
    /// once the rebuild lands. Returns `false` when shutdown arrives
    /// first.
    async fn connect_and_reconcile(&mut self) -> bool {
        let interval = self.core.config().connect_retry();
        let mut announced = false;

        loop {
            if let Err(e) = self.core.store().ping().await {
                announced = false;
                warn!(queue = %self.core.name(), error = %e, "Store unreachable, retrying");
                QueueMetrics::store_error(self.core.name());
                self.core.emit(QueueEvent::StoreConnectionFail {
                    error: e.to_string(),
                });
                tokio::select! {
                    _ = self.shutdown_rx.recv() => return false,
                    () = sleep(interval) => continue,
                }
            }

            if !announced {
                info!(queue = %self.core.name(), "Store connected");
                self.core.emit(QueueEvent::StoreConnected);
                announced = true;
            }

            match self.reconcile().await {
                Ok(count) => {
                    info!(
                        queue = %self.core.name(),
                        pending = count,
                        "Rebuilt pending order from store"
                    );
                    self.core.emit(QueueEvent::Ready {
                        state: self.core.snapshot(),
                    });
                    return true;
                }
                Err(e) => {
                    error!(queue = %self.core.name(), error = %e, "Rebuild failed, retrying");
                    QueueMetrics::store_error(self.core.name());
                    self.core.emit(QueueEvent::StoreConnectionFail {
                        error: e.to_string(),
                    });
                    tokio::select! {
                        _ = self.shutdown_rx.recv() => return false,
                        () = sleep(interval) => {}
                    }
                }
            }
        }
    }

    /// Replace the pending order with the jobs-hash contents, in store
    /// field order. Returns how many jobs the store held.
    async fn reconcile(&self) -> Result<usize, StoreError> {
        let fields = self.core.store().hash_get_all(self.core.keys().jobs()).await?;
        let count = fields.len();
        let ids = fields.into_iter().map(|(field, _)| field);
        self.core.state().lock().replace_pending(ids);
        self.core.record_depth();
        Ok(count)
    }

    /// Idle until a producer save, an expiry ack, or shutdown arrives.
    /// Returns `false` on shutdown.
    async fn wait_for_work(&mut self) -> bool {
        debug!(queue = %self.core.name(), "Queue idle");
        tokio::select! {
            _ = self.shutdown_rx.recv() => false,
            () = self.core.wait_for_wake() => true,
            Some(decision) = self.ack_rx.recv() => {
                self.apply_expiry_decision(decision).await;
                true
            }
        }
    }

    /// One scheduling pass over the head of the pending order.
    async fn tick(&mut self) -> Tick {
        let head = self.core.state().lock().head();
        let job_id = match head {
            Some(id) => id,
            None => return Tick::Idle,
        };

        // The store owns the truth for budgets and deadlines; re-read the
        // record for every attempt.
        let raw = match self
            .core
            .store()
            .hash_get(self.core.keys().jobs(), &job_id)
            .await
        {
            Ok(value) => value,
            Err(e) => return self.store_failed("fetch job record", &e),
        };

        let record = match raw.as_deref().map(JobRecord::from_json) {
            Some(Ok(record)) => record,
            Some(Err(e)) => {
                warn!(
                    queue = %self.core.name(),
                    job_id = %job_id,
                    error = %e,
                    "Dropping job with unreadable record"
                );
                // Purge it, or the next rebuild resurrects it.
                if let Err(e) = self
                    .core
                    .store()
                    .hash_delete(self.core.keys().jobs(), &job_id)
                    .await
                {
                    return self.store_failed("purge unreadable record", &e);
                }
                self.drop_head(&job_id);
                return self.finish_or_continue().await;
            }
            None => {
                warn!(
                    queue = %self.core.name(),
                    job_id = %job_id,
                    "Dropping job with no record in store"
                );
                self.drop_head(&job_id);
                return self.finish_or_continue().await;
            }
        };

        // Wait out the head's delay. A save or an expiry ack during the
        // wait restarts the pass against the changed queue.
        let wait = dispatch_delay(&record.opt, self.core.config(), self.after_failure);
        self.after_failure = false;
        match self.wait_out_delay(wait).await {
            Wait::Fired => {}
            Wait::Restart => return Tick::Continue,
            Wait::Stop => return Tick::Stop,
        }

        // A spent budget is consumed here, without dispatch or events.
        if record.opt.is_exhausted() {
            return self.consume_exhausted(&job_id, &record).await;
        }

        // Expiry short-circuits dispatch; removal waits for the ack, so an
        // unacknowledged job surfaces again on the next pass.
        if record.opt.has_expired(epoch_ms()) {
            info!(queue = %self.core.name(), job_id = %job_id, "Job expired");
            let ack = ExpiryAck::new(job_id.clone(), self.core.ack_sender());
            self.core.emit(QueueEvent::Expired {
                job_id,
                record,
                ack,
            });
            return Tick::Continue;
        }

        // Dispatch: hand the job to its handler and wait for the verdict.
        let (completion, outcome_rx) = CompletionHandle::new(job_id.clone());
        let started = Instant::now();
        debug!(queue = %self.core.name(), job_id = %job_id, "Dispatching job");
        self.core.emit(QueueEvent::Processing {
            job_id: job_id.clone(),
            record: record.clone(),
            completion,
        });

        let outcome = tokio::select! {
            _ = self.shutdown_rx.recv() => {
                // The record stays persisted; the next run re-delivers it.
                warn!(
                    queue = %self.core.name(),
                    job_id = %job_id,
                    "Shutdown with a job in flight"
                );
                return Tick::Stop;
            }
            result = outcome_rx => match result {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        queue = %self.core.name(),
                        job_id = %job_id,
                        "Completion handle dropped without an outcome; treating as failure"
                    );
                    Outcome::Failure
                }
            },
        };

        QueueMetrics::job_duration(self.core.name(), started.elapsed());

        match outcome {
            Outcome::Success => self.complete_job(&job_id, record).await,
            Outcome::Failure => self.fail_job(&job_id, record).await,
        }
    }

    /// Sleep `wait`, unless the queue changes or shutdown arrives first.
    async fn wait_out_delay(&mut self, wait: Duration) -> Wait {
        tokio::select! {
            _ = self.shutdown_rx.recv() => Wait::Stop,
            () = sleep(wait) => Wait::Fired,
            () = self.core.wait_for_wake() => Wait::Restart,
            Some(decision) = self.ack_rx.recv() => {
                self.apply_expiry_decision(decision).await;
                Wait::Restart
            }
        }
    }

    /// Success outcome: the store forgets the job before memory does.
    async fn complete_job(&mut self, job_id: &str, record: JobRecord) -> Tick {
        if self.core.config().record_done {
            match record.to_json() {
                Ok(serialized) => {
                    if let Err(e) = self
                        .core
                        .store()
                        .hash_set(self.core.keys().done(), job_id, &serialized)
                        .await
                    {
                        return self.store_failed("record completion", &e);
                    }
                }
                Err(e) => {
                    warn!(
                        queue = %self.core.name(),
                        job_id = %job_id,
                        error = %e,
                        "Skipping done-hash write for unserializable record"
                    );
                }
            }
        }

        if let Err(e) = self
            .core
            .store()
            .hash_delete(self.core.keys().jobs(), job_id)
            .await
        {
            return self.store_failed("remove completed job", &e);
        }

        {
            let mut state = self.core.state().lock();
            state.remove(job_id);
            state.record_done(job_id);
        }
        self.core.record_depth();
        QueueMetrics::job_done(self.core.name());
        info!(queue = %self.core.name(), job_id = %job_id, "Job done");
        self.core.emit(QueueEvent::Done {
            job_id: job_id.to_string(),
            record,
            state: self.core.snapshot(),
        });

        self.finish_or_continue().await
    }

    /// Failure outcome: burn budget where it is finite, then requeue.
    async fn fail_job(&mut self, job_id: &str, mut record: JobRecord) -> Tick {
        self.after_failure = true;

        if record.opt.is_unlimited() {
            // An unlimited budget never exhausts, so this is always a retry.
            self.core.state().lock().rotate_to_back();
            QueueMetrics::job_retried(self.core.name());
            debug!(queue = %self.core.name(), job_id = %job_id, "Job failed, retrying");
            self.core.emit(QueueEvent::Retrying {
                job_id: job_id.to_string(),
                record,
            });
            return self.finish_or_continue().await;
        }

        record.opt.retries -= 1;
        match record.to_json() {
            Ok(serialized) => {
                if let Err(e) = self
                    .core
                    .store()
                    .hash_set(self.core.keys().jobs(), job_id, &serialized)
                    .await
                {
                    return self.store_failed("persist retry budget", &e);
                }
            }
            Err(e) => {
                warn!(
                    queue = %self.core.name(),
                    job_id = %job_id,
                    error = %e,
                    "Could not serialize retry update"
                );
            }
        }

        self.core.state().lock().rotate_to_back();

        if record.opt.retries > 0 {
            QueueMetrics::job_retried(self.core.name());
            info!(
                queue = %self.core.name(),
                job_id = %job_id,
                retries_left = record.opt.retries,
                "Job failed, retrying"
            );
            self.core.emit(QueueEvent::Retrying {
                job_id: job_id.to_string(),
                record,
            });
        } else {
            warn!(queue = %self.core.name(), job_id = %job_id, "Job failed, no retries left");
            self.core.emit(QueueEvent::Fail {
                job_id: job_id.to_string(),
                record,
            });
        }

        self.finish_or_continue().await
    }

    /// Consume a head whose retry budget is already spent: archive the
    /// payload in the fail-hash and remove the job, with no events.
    async fn consume_exhausted(&mut self, job_id: &str, record: &JobRecord) -> Tick {
        if let Err(e) = self
            .core
            .store()
            .hash_set(self.core.keys().fail(), job_id, &record.data)
            .await
        {
            return self.store_failed("archive failed job", &e);
        }
        if let Err(e) = self
            .core
            .store()
            .hash_delete(self.core.keys().jobs(), job_id)
            .await
        {
            return self.store_failed("remove failed job", &e);
        }

        self.core.state().lock().remove(job_id);
        self.core.record_depth();
        QueueMetrics::job_failed(self.core.name());
        warn!(queue = %self.core.name(), job_id = %job_id, "Discarded job with no retries left");

        self.finish_or_continue().await
    }

    /// After an outcome: when the pending order runs dry, ask the store
    /// once more before declaring the queue finished.
    async fn finish_or_continue(&mut self) -> Tick {
        if !self.core.state().lock().is_empty() {
            return Tick::Continue;
        }

        match self.reconcile().await {
            Ok(0) => {
                info!(queue = %self.core.name(), "Queue finished");
                self.core.emit(QueueEvent::Finished {
                    state: self.core.snapshot(),
                });
                Tick::Idle
            }
            Ok(count) => {
                debug!(
                    queue = %self.core.name(),
                    pending = count,
                    "Store still holds jobs, continuing"
                );
                Tick::Continue
            }
            Err(e) => self.store_failed("refetch pending jobs", &e),
        }
    }

    /// Apply an archival acknowledgment from an `expired` listener.
    async fn apply_expiry_decision(&self, decision: ExpiryDecision) {
        if !decision.remove {
            debug!(
                queue = %self.core.name(),
                job_id = %decision.job_id,
                "Expiry ack declined removal"
            );
            return;
        }

        if let Err(e) = self
            .core
            .store()
            .hash_delete(self.core.keys().jobs(), &decision.job_id)
            .await
        {
            error!(
                queue = %self.core.name(),
                job_id = %decision.job_id,
                error = %e,
                "Failed to remove expired job"
            );
            QueueMetrics::store_error(self.core.name());
            self.core.emit(QueueEvent::StoreConnectionFail {
                error: e.to_string(),
            });
            return;
        }

        self.core.state().lock().remove(&decision.job_id);
        self.core.record_depth();
        QueueMetrics::job_expired(self.core.name());
        info!(
            queue = %self.core.name(),
            job_id = %decision.job_id,
            "Expired job removed"
        );
    }

    /// Drop a head id whose record is gone, memory side only.
    fn drop_head(&self, job_id: &str) {
        self.core.state().lock().remove(job_id);
        self.core.record_depth();
        QueueMetrics::job_dropped(self.core.name());
    }

    /// Route a store failure into the probe cycle.
    fn store_failed(&self, operation: &str, error: &StoreError) -> Tick {
        error!(
            queue = %self.core.name(),
            operation,
            error = %error,
            "Store operation failed"
        );
        QueueMetrics::store_error(self.core.name());
        self.core.emit(QueueEvent::StoreConnectionFail {
            error: error.to_string(),
        });
        Tick::Disconnected
    }
}

/// Timer for the current head: an explicit per-job delay wins, then the
/// retry cool-down right after a failure, then the queue debounce.
fn dispatch_delay(opt: &JobOptions, config: &QueueConfig, after_failure: bool) -> Duration {
    if opt.has_delay() {
        Duration::from_millis(opt.delay_until.max(0) as u64)
    } else if after_failure {
        config.retry_delay()
    } else {
        config.debounce()
    }
}
