//! Store key layout for a queue.

/// Namespace prefix shared by every queue key.
const KEY_PREFIX: &str = "rq";

/// Key set for one queue's durable hashes.
///
/// Layout for a queue named `Q`:
///
/// - `rq:Q:jobs` — pending records, one field per job id
/// - `rq:Q:done` — completion audit trail
/// - `rq:Q:fail` — payloads whose retry budget ran out
///
/// The layout is part of the on-disk contract; changing it strands every
/// queue already persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    jobs: String,
    done: String,
    fail: String,
}

impl QueueKeys {
    /// Build the key set for the given queue name.
    pub fn new(queue_name: &str) -> Self {
        Self {
            jobs: format!("{}:{}:jobs", KEY_PREFIX, queue_name),
            done: format!("{}:{}:done", KEY_PREFIX, queue_name),
            fail: format!("{}:{}:fail", KEY_PREFIX, queue_name),
        }
    }

    /// Hash of job id -> serialized record, the authoritative pending set.
    pub fn jobs(&self) -> &str {
        &self.jobs
    }

    /// Hash of job id -> serialized record at completion time.
    pub fn done(&self) -> &str {
        &self.done
    }

    /// Hash of job id -> payload for jobs that exhausted their retries.
    pub fn fail(&self) -> &str {
        &self.fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_keys_layout() {
        let keys = QueueKeys::new("payments");
        assert_eq!(keys.jobs(), "rq:payments:jobs");
        assert_eq!(keys.done(), "rq:payments:done");
        assert_eq!(keys.fail(), "rq:payments:fail");
    }

    #[test]
    fn test_queue_keys_distinct_per_queue() {
        let a = QueueKeys::new("a");
        let b = QueueKeys::new("b");
        assert_ne!(a.jobs(), b.jobs());
    }
}
