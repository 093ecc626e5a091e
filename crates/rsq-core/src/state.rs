//! In-memory queue state.

use std::collections::VecDeque;

use serde::Serialize;

/// Process-local view of the queue.
///
/// `pending` holds dispatch order, `done` collects completions for this
/// process lifetime. Both are caches: the jobs-hash in the store is the
/// durable truth, and reconciliation rebuilds `pending` from it wholesale
/// whenever store connectivity is (re)established.
#[derive(Debug, Default)]
pub struct QueueState {
    pending: VecDeque<String>,
    done: Vec<String>,
}

impl QueueState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Head of the pending order, if any.
    pub fn head(&self) -> Option<String> {
        self.pending.front().cloned()
    }

    /// Append a job id at the tail.
    pub fn push(&mut self, job_id: impl Into<String>) {
        self.pending.push_back(job_id.into());
    }

    /// Move the head to the tail, keeping every other position.
    pub fn rotate_to_back(&mut self) {
        if let Some(id) = self.pending.pop_front() {
            self.pending.push_back(id);
        }
    }

    /// Remove every occurrence of `job_id` from the pending order.
    pub fn remove(&mut self, job_id: &str) {
        self.pending.retain(|id| id != job_id);
    }

    /// True when the given id is pending.
    pub fn contains(&self, job_id: &str) -> bool {
        self.pending.iter().any(|id| id == job_id)
    }

    /// Replace the whole pending order.
    pub fn replace_pending(&mut self, ids: impl IntoIterator<Item = String>) {
        self.pending = ids.into_iter().collect();
    }

    /// Drop every pending id.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Record a completion for this process lifetime.
    pub fn record_done(&mut self, job_id: impl Into<String>) {
        self.done.push(job_id.into());
    }

    /// Number of pending jobs.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of completions recorded this process lifetime.
    pub fn done_len(&self) -> usize {
        self.done.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Cheap copy for event payloads and diagnostics.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            pending: self.pending.iter().cloned().collect(),
            done: self.done.clone(),
        }
    }
}

/// Point-in-time copy of the queue state, carried by events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    /// Pending job ids in dispatch order.
    pub pending: Vec<String>,

    /// Jobs completed this process lifetime, in completion order.
    pub done: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_preserves_fifo_order() {
        let mut state = QueueState::new();
        state.push("a");
        state.push("b");
        state.push("c");

        assert_eq!(state.head(), Some("a".to_string()));
        assert_eq!(state.pending_len(), 3);
    }

    #[test]
    fn test_rotate_moves_head_to_tail() {
        let mut state = QueueState::new();
        state.push("a");
        state.push("b");
        state.push("c");

        state.rotate_to_back();

        assert_eq!(state.snapshot().pending, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_rotate_on_empty_is_a_noop() {
        let mut state = QueueState::new();
        state.rotate_to_back();
        assert!(state.is_empty());
    }

    #[test]
    fn test_remove_clears_every_occurrence() {
        let mut state = QueueState::new();
        state.push("a");
        state.push("b");
        state.push("a");

        state.remove("a");

        assert_eq!(state.snapshot().pending, vec!["b"]);
        assert!(!state.contains("a"));
    }

    #[test]
    fn test_replace_pending_discards_previous_order() {
        let mut state = QueueState::new();
        state.push("stale");

        state.replace_pending(vec!["x".to_string(), "y".to_string()]);

        assert_eq!(state.pending_len(), 2);
        assert!(!state.contains("stale"));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut state = QueueState::new();
        state.push("a");
        state.record_done("z");

        let snapshot = state.snapshot();
        state.push("b");

        assert_eq!(snapshot.pending, vec!["a"]);
        assert_eq!(snapshot.done, vec!["z"]);
    }
}
