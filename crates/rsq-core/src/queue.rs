//! The queue facade: construction, producer API, lifecycle control.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rsq_store::{QueueKeys, RedisStore, StoreAdapter};
use tokio::sync::{broadcast, mpsc, Notify};
use tracing::info;

use crate::builder::JobBuilder;
use crate::completion::ExpiryDecision;
use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::events::{EventBus, QueueEvent};
use crate::metrics::QueueMetrics;
use crate::scheduler::Scheduler;
use crate::state::{QueueState, StateSnapshot};

/// Shared internals behind every [`Queue`] handle.
///
/// Producers (builders) and the scheduler loop both hold an `Arc` of this;
/// the store serializes durable writes while `state` sits behind its own
/// lock for the in-memory order.
pub(crate) struct QueueCore {
    name: String,
    config: QueueConfig,
    keys: QueueKeys,
    store: Arc<dyn StoreAdapter>,
    state: Mutex<QueueState>,
    events: EventBus,
    wake: Notify,
    ack_tx: mpsc::UnboundedSender<ExpiryDecision>,
    shutdown_tx: broadcast::Sender<()>,
    running: AtomicBool,
}

impl QueueCore {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub(crate) fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    pub(crate) fn store(&self) -> &dyn StoreAdapter {
        self.store.as_ref()
    }

    pub(crate) fn state(&self) -> &Mutex<QueueState> {
        &self.state
    }

    pub(crate) fn emit(&self, event: QueueEvent) {
        self.events.emit(&event);
    }

    /// Ask the loop to re-evaluate the head. Wakes are coalesced; many
    /// saves in a row trigger one fresh scheduling pass.
    pub(crate) fn wake(&self) {
        self.wake.notify_one();
    }

    pub(crate) async fn wait_for_wake(&self) {
        self.wake.notified().await;
    }

    pub(crate) fn ack_sender(&self) -> mpsc::UnboundedSender<ExpiryDecision> {
        self.ack_tx.clone()
    }

    pub(crate) fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub(crate) fn snapshot(&self) -> StateSnapshot {
        self.state.lock().snapshot()
    }

    pub(crate) fn record_depth(&self) {
        QueueMetrics::pending_depth(&self.name, self.state.lock().pending_len());
    }
}

/// A durable, single-consumer job queue.
///
/// Cloneable handle; every clone shares one engine. Producers call
/// [`create_job`](Queue::create_job) and save from any task, while exactly
/// one task drives [`run`](Queue::run). Handlers subscribe with
/// [`on`](Queue::on) and answer `processing` events through their
/// completion handle.
///
/// Separate instances sharing one queue name are not coordinated; run one
/// consumer per name and let producers reach it through the store.
#[derive(Clone)]
pub struct Queue {
    core: Arc<QueueCore>,
    ack_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<ExpiryDecision>>>>,
}

impl Queue {
    /// Create a queue over an explicit store adapter.
    pub fn with_store(
        name: impl Into<String>,
        config: QueueConfig,
        store: Arc<dyn StoreAdapter>,
    ) -> Self {
        let name = name.into();
        let keys = QueueKeys::new(&name);
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);

        let core = Arc::new(QueueCore {
            name,
            config,
            keys,
            store,
            state: Mutex::new(QueueState::new()),
            events: EventBus::new(),
            wake: Notify::new(),
            ack_tx,
            shutdown_tx,
            running: AtomicBool::new(false),
        });

        Self {
            core,
            ack_rx: Arc::new(Mutex::new(Some(ack_rx))),
        }
    }

    /// Create a queue backed by Redis at `config.redis_url`.
    ///
    /// The connection is established lazily; the loop probes the store
    /// until it answers, so a queue can be constructed while Redis is
    /// still coming up.
    pub fn new(name: impl Into<String>, config: QueueConfig) -> QueueResult<Self> {
        let store = RedisStore::open(&config.redis_url)?;
        Ok(Self::with_store(name, config, Arc::new(store)))
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Subscribe to lifecycle events. Listeners run synchronously on the
    /// emitting task, in registration order.
    pub fn on(&self, listener: impl Fn(&QueueEvent) + Send + Sync + 'static) {
        self.core.events.subscribe(listener);
    }

    /// Start building a job. Nothing is persisted until
    /// [`save`](JobBuilder::save) is called.
    pub fn create_job(&self, job_id: impl Into<String>, payload: impl Into<String>) -> JobBuilder {
        JobBuilder::new(Arc::clone(&self.core), job_id, payload)
    }

    /// Drive the queue loop until [`stop`](Queue::stop) is called.
    ///
    /// Only one task may run the loop at a time; a second concurrent call
    /// returns [`QueueError::AlreadyRunning`]. After the loop stops the
    /// queue may be run again.
    pub async fn run(&self) -> QueueResult<()> {
        if self.core.running.swap(true, Ordering::SeqCst) {
            return Err(QueueError::AlreadyRunning);
        }

        let ack_rx = match self.ack_rx.lock().take() {
            Some(rx) => rx,
            None => {
                self.core.running.store(false, Ordering::SeqCst);
                return Err(QueueError::AlreadyRunning);
            }
        };

        let mut scheduler = Scheduler::new(Arc::clone(&self.core), ack_rx);
        scheduler.run().await;

        *self.ack_rx.lock() = Some(scheduler.into_ack_rx());
        self.core.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Signal the loop to stop. An in-flight job is abandoned; its record
    /// stays persisted and is re-delivered on the next run.
    pub fn stop(&self) {
        info!(queue = %self.core.name(), "Stopping queue...");
        let _ = self.core.shutdown_tx.send(());
    }

    /// True while the loop is running.
    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::SeqCst)
    }

    /// Delete every pending record and clear the in-memory order.
    ///
    /// Administrative flush: the jobs-hash is dropped wholesale and `reset`
    /// is emitted. The done- and fail-hashes are left alone. A store
    /// failure surfaces before anything in memory is touched.
    pub async fn restore_jobs(&self) -> QueueResult<()> {
        self.core.store().delete_key(self.core.keys().jobs()).await?;

        self.core.state().lock().clear_pending();
        self.core.record_depth();
        info!(queue = %self.core.name(), "Queue flushed");
        self.core.emit(QueueEvent::Reset {
            state: self.core.snapshot(),
        });
        self.core.wake();
        Ok(())
    }

    /// Current counters, also written to the log.
    pub fn stats(&self) -> QueueStats {
        let snapshot = self.core.snapshot();
        let stats = QueueStats {
            queue: self.core.name().to_string(),
            pending: snapshot.pending.len(),
            done: snapshot.done.len(),
        };
        info!(
            queue = %stats.queue,
            pending = stats.pending,
            done = stats.done,
            "Queue stats"
        );
        stats
    }

    /// Point-in-time copy of the in-memory state.
    pub fn snapshot(&self) -> StateSnapshot {
        self.core.snapshot()
    }
}

/// Pending/done counters for one queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    /// Queue name.
    pub queue: String,
    /// Jobs awaiting dispatch.
    pub pending: usize,
    /// Jobs completed this process lifetime.
    pub done: usize,
}

impl std::fmt::Display for QueueStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "queue '{}': {} pending, {} done",
            self.queue, self.pending, self.done
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsq_store::MemoryStore;

    fn memory_queue(name: &str) -> (Queue, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let queue = Queue::with_store(name, QueueConfig::default(), store.clone());
        (queue, store)
    }

    #[tokio::test]
    async fn test_save_then_flush() {
        let (queue, store) = memory_queue("flush");

        queue.create_job("a", "1").save().await.expect("save");
        queue.create_job("b", "2").save().await.expect("save");
        assert_eq!(store.field_count("rq:flush:jobs"), 2);

        queue.restore_jobs().await.expect("flush");
        assert_eq!(store.field_count("rq:flush:jobs"), 0);
        assert!(queue.snapshot().pending.is_empty());
    }

    #[tokio::test]
    async fn test_flush_emits_reset_with_empty_state() {
        let (queue, _store) = memory_queue("reset");

        let pending_at_reset = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&pending_at_reset);
        queue.on(move |event| {
            if let QueueEvent::Reset { state } = event {
                *seen.lock() = Some(state.pending.len());
            }
        });

        queue.create_job("a", "1").save().await.expect("save");
        queue.restore_jobs().await.expect("flush");

        assert_eq!(*pending_at_reset.lock(), Some(0));
    }

    #[tokio::test]
    async fn test_stats_counts_pending() {
        let (queue, _store) = memory_queue("stats");

        queue.create_job("a", "1").save().await.expect("save");
        queue.create_job("b", "2").save().await.expect("save");

        let stats = queue.stats();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.done, 0);
        assert_eq!(stats.to_string(), "queue 'stats': 2 pending, 0 done");
    }

    #[tokio::test]
    async fn test_flush_fails_closed_when_store_is_down() {
        let (queue, store) = memory_queue("down");

        queue.create_job("a", "1").save().await.expect("save");
        store.set_available(false);

        assert!(queue.restore_jobs().await.is_err());
        // Memory still reflects the store's (unchanged) contents.
        assert_eq!(queue.snapshot().pending, vec!["a"]);
    }
}
