//! Queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for one queue instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Wait between jobs when the head carries no explicit delay, in
    /// milliseconds. Every `save()` re-arms this timer, so a busy producer
    /// naturally debounces the next dispatch.
    #[serde(default = "default_debounce_ms", alias = "next_job_process_delay_ms")]
    pub delayed_debounce_ms: u64,

    /// Wait before the next dispatch after a failed attempt, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Interval between store connectivity probes while disconnected, in
    /// milliseconds.
    #[serde(default = "default_connect_retry_ms")]
    pub connect_retry_ms: u64,

    /// Keep an audit copy of completed records in the done-hash.
    #[serde(default = "default_record_done")]
    pub record_done: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            delayed_debounce_ms: default_debounce_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            connect_retry_ms: default_connect_retry_ms(),
            record_done: default_record_done(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_debounce_ms() -> u64 {
    1000 // 1 second
}

fn default_retry_delay_ms() -> u64 {
    1000 // 1 second
}

fn default_connect_retry_ms() -> u64 {
    2000 // 2 seconds
}

fn default_record_done() -> bool {
    true
}

impl QueueConfig {
    /// Returns the inter-job debounce as a Duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.delayed_debounce_ms)
    }

    /// Returns the post-failure delay as a Duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Returns the connectivity probe interval as a Duration.
    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.delayed_debounce_ms, 1000);
        assert_eq!(config.retry_delay_ms, 1000);
        assert_eq!(config.connect_retry_ms, 2000);
        assert!(config.record_done);
    }

    #[test]
    fn test_debounce_field_alias() {
        let config: QueueConfig =
            serde_json::from_str(r#"{"next_job_process_delay_ms": 250}"#).expect("parse");
        assert_eq!(config.delayed_debounce_ms, 250);
    }
}
