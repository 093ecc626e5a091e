//! Queue metrics published through the `metrics` facade.
//!
//! Names are exposed as constants so exporters and dashboards can refer to
//! them without string drift. Call [`register_metrics`] once at startup to
//! attach descriptions; recording works with or without it.

use std::time::Duration;

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};

/// Metric names used by the queue engine.
pub mod names {
    /// Total jobs persisted by `save()`.
    pub const JOBS_SAVED_TOTAL: &str = "rsq_jobs_saved_total";

    /// Total save attempts the store rejected.
    pub const JOBS_SAVE_FAILED_TOTAL: &str = "rsq_jobs_save_failed_total";

    /// Total jobs completed successfully.
    pub const JOBS_DONE_TOTAL: &str = "rsq_jobs_done_total";

    /// Total jobs moved to the failed-hash.
    pub const JOBS_FAILED_TOTAL: &str = "rsq_jobs_failed_total";

    /// Total failed attempts that went back to the tail.
    pub const JOBS_RETRIED_TOTAL: &str = "rsq_jobs_retried_total";

    /// Total expired jobs removed after acknowledgment.
    pub const JOBS_EXPIRED_TOTAL: &str = "rsq_jobs_expired_total";

    /// Total pending ids dropped for missing or unreadable records.
    pub const JOBS_DROPPED_TOTAL: &str = "rsq_jobs_dropped_total";

    /// Total store command failures observed by the engine.
    pub const STORE_ERRORS_TOTAL: &str = "rsq_store_errors_total";

    /// Jobs currently pending.
    pub const JOBS_PENDING: &str = "rsq_jobs_pending";

    /// Wall time from dispatch to outcome, in seconds.
    pub const JOB_DURATION_SECONDS: &str = "rsq_job_duration_seconds";
}

/// Register metric descriptions with the installed recorder.
pub fn register_metrics() {
    // Job counters
    describe_counter!(names::JOBS_SAVED_TOTAL, "Total jobs persisted by save()");
    describe_counter!(
        names::JOBS_SAVE_FAILED_TOTAL,
        "Total save attempts the store rejected"
    );
    describe_counter!(names::JOBS_DONE_TOTAL, "Total jobs completed successfully");
    describe_counter!(names::JOBS_FAILED_TOTAL, "Total jobs moved to the failed-hash");
    describe_counter!(
        names::JOBS_RETRIED_TOTAL,
        "Total failed attempts that went back to the tail"
    );
    describe_counter!(
        names::JOBS_EXPIRED_TOTAL,
        "Total expired jobs removed after acknowledgment"
    );
    describe_counter!(
        names::JOBS_DROPPED_TOTAL,
        "Total pending ids dropped for missing or unreadable records"
    );

    // Store health
    describe_counter!(
        names::STORE_ERRORS_TOTAL,
        "Total store command failures observed by the engine"
    );

    // Gauges
    describe_gauge!(names::JOBS_PENDING, "Jobs currently pending");

    // Histograms
    describe_histogram!(
        names::JOB_DURATION_SECONDS,
        "Wall time from dispatch to outcome in seconds"
    );
}

/// Recorder for queue engine metrics, labeled by queue name.
#[derive(Clone)]
pub struct QueueMetrics;

impl QueueMetrics {
    /// Record a successful save.
    pub fn job_saved(queue: &str) {
        counter!(names::JOBS_SAVED_TOTAL, "queue" => queue.to_string()).increment(1);
    }

    /// Record a rejected save.
    pub fn save_failed(queue: &str) {
        counter!(names::JOBS_SAVE_FAILED_TOTAL, "queue" => queue.to_string()).increment(1);
    }

    /// Record a completion.
    pub fn job_done(queue: &str) {
        counter!(names::JOBS_DONE_TOTAL, "queue" => queue.to_string()).increment(1);
    }

    /// Record a job moved to the failed-hash.
    pub fn job_failed(queue: &str) {
        counter!(names::JOBS_FAILED_TOTAL, "queue" => queue.to_string()).increment(1);
    }

    /// Record a failed attempt that was requeued.
    pub fn job_retried(queue: &str) {
        counter!(names::JOBS_RETRIED_TOTAL, "queue" => queue.to_string()).increment(1);
    }

    /// Record an expired job removed after acknowledgment.
    pub fn job_expired(queue: &str) {
        counter!(names::JOBS_EXPIRED_TOTAL, "queue" => queue.to_string()).increment(1);
    }

    /// Record a pending id dropped without processing.
    pub fn job_dropped(queue: &str) {
        counter!(names::JOBS_DROPPED_TOTAL, "queue" => queue.to_string()).increment(1);
    }

    /// Record a store command failure.
    pub fn store_error(queue: &str) {
        counter!(names::STORE_ERRORS_TOTAL, "queue" => queue.to_string()).increment(1);
    }

    /// Update the pending depth gauge.
    pub fn pending_depth(queue: &str, depth: usize) {
        gauge!(names::JOBS_PENDING, "queue" => queue.to_string()).set(depth as f64);
    }

    /// Record one dispatch-to-outcome duration.
    pub fn job_duration(queue: &str, duration: Duration) {
        histogram!(names::JOB_DURATION_SECONDS, "queue" => queue.to_string())
            .record(duration.as_secs_f64());
    }
}
