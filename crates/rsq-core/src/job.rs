//! Job records and scheduling options.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::QueueResult;

/// Scheduling options carried by every job.
///
/// All three fields use `-1` as their "unset" sentinel. The serialized
/// field names (`delayUntil`, `expiredTime`) are part of the stored record
/// format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    /// Remaining attempts. `-1` means unlimited.
    pub retries: i64,

    /// Wait in milliseconds before the job may start. `-1` means use the
    /// queue's debounce interval instead.
    pub delay_until: i64,

    /// Absolute expiry deadline as epoch milliseconds. `-1` means never.
    pub expired_time: i64,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            retries: -1,
            delay_until: -1,
            expired_time: -1,
        }
    }
}

impl JobOptions {
    /// True when the retry budget is spent.
    pub fn is_exhausted(&self) -> bool {
        self.retries == 0
    }

    /// True when retries never run out.
    pub fn is_unlimited(&self) -> bool {
        self.retries == -1
    }

    /// True when the job carries an explicit start delay.
    pub fn has_delay(&self) -> bool {
        self.delay_until != -1
    }

    /// True when the expiry deadline has passed as of `now_ms`.
    pub fn has_expired(&self, now_ms: i64) -> bool {
        self.expired_time != -1 && now_ms > self.expired_time
    }
}

/// The persisted form of a job: opaque payload plus scheduling options.
///
/// Stored as one JSON value per job inside the queue's jobs-hash, keyed by
/// the caller-assigned job id. The payload is never interpreted by the
/// engine; producers serialize it, handlers deserialize it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Opaque payload blob.
    pub data: String,

    /// Scheduling options.
    pub opt: JobOptions,
}

impl JobRecord {
    /// Create a record with default options.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            opt: JobOptions::default(),
        }
    }

    /// Serialize to the stored JSON form.
    pub fn to_json(&self) -> QueueResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a record from its stored JSON form.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Current wall-clock time as epoch milliseconds.
pub(crate) fn epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}
