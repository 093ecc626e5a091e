//! Shared infrastructure for queue engine integration tests.
//!
//! Every test drives a real scheduler loop over a [`MemoryStore`], records
//! the emitted events and answers `processing` dispatches through scripted
//! completers.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rsq_core::{EventKind, MemoryStore, Outcome, Queue, QueueConfig, QueueEvent};
use tokio::task::JoinHandle;

/// Queue config with millisecond pacing so loop tests finish quickly.
pub fn fast_config() -> QueueConfig {
    QueueConfig {
        delayed_debounce_ms: 1,
        retry_delay_ms: 1,
        connect_retry_ms: 1,
        ..QueueConfig::default()
    }
}

/// A queue over a fresh in-memory store, plus the store handle for direct
/// assertions against the persisted hashes.
pub fn memory_queue(name: &str) -> (Queue, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let queue = Queue::with_store(name, fast_config(), store.clone());
    (queue, store)
}

/// Drive the queue loop on its own task; `queue.stop()` ends it.
pub fn start_queue(queue: &Queue) -> JoinHandle<()> {
    // Show engine logs when a test fails; repeat installs are fine.
    let _ = tracing_subscriber::fmt::try_init();

    let runner = queue.clone();
    tokio::spawn(async move {
        runner.run().await.expect("queue loop");
    })
}

/// Records every emitted event kind, with the job id when there is one.
#[derive(Clone, Default)]
pub struct EventRecorder {
    entries: Arc<Mutex<Vec<(EventKind, Option<String>)>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to a queue. Install before any activity to see everything.
    pub fn install(&self, queue: &Queue) {
        let entries = Arc::clone(&self.entries);
        queue.on(move |event| {
            entries
                .lock()
                .push((event.kind(), event.job_id().map(str::to_string)));
        });
    }

    /// Every recorded kind, in emission order.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.entries.lock().iter().map(|(kind, _)| *kind).collect()
    }

    /// How many times `kind` was emitted.
    pub fn count(&self, kind: EventKind) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(recorded, _)| *recorded == kind)
            .count()
    }

    /// The job ids carried by emissions of `kind`, in order.
    pub fn job_ids_of(&self, kind: EventKind) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(recorded, _)| *recorded == kind)
            .filter_map(|(_, id)| id.clone())
            .collect()
    }
}

/// Answer every dispatch: jobs listed in `failing` report failure,
/// everything else reports success.
pub fn complete_with(queue: &Queue, failing: &[&str]) {
    let failing: Vec<String> = failing.iter().map(|id| (*id).to_string()).collect();
    queue.on(move |event| {
        if let QueueEvent::Processing {
            job_id, completion, ..
        } = event
        {
            let outcome = if failing.contains(job_id) {
                Outcome::Failure
            } else {
                Outcome::Success
            };
            completion.complete(outcome).expect("report outcome");
        }
    });
}

/// Poll until `condition` holds. Panics after a generous deadline, which
/// also covers virtual-clock tests with long scheduled delays.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(300), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Wait until the recorder has seen `kind` at least `at_least` times.
pub async fn wait_for(recorder: &EventRecorder, kind: EventKind, at_least: usize) {
    wait_until(|| recorder.count(kind) >= at_least).await;
}
