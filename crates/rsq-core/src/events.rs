//! Queue lifecycle events and the listener bus.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, warn};

use crate::completion::{CompletionHandle, ExpiryAck};
use crate::job::JobRecord;
use crate::state::StateSnapshot;

/// Discriminant of a [`QueueEvent`], handy for filtering and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Reconciliation completed; the loop is primed.
    Ready,
    /// A job was persisted and enqueued.
    New,
    /// A job was handed to its handler.
    Processing,
    /// A handler reported success.
    Done,
    /// A job ran out of retries.
    Fail,
    /// A job failed with budget remaining and was requeued.
    Retrying,
    /// A job passed its expiry deadline.
    Expired,
    /// The queue drained completely.
    Finished,
    /// The queue was flushed by `restore_jobs`.
    Reset,
    /// Store connectivity established.
    StoreConnected,
    /// Store connectivity lost, or a listener panicked.
    StoreConnectionFail,
}

impl EventKind {
    /// Stable textual name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Ready => "ready",
            EventKind::New => "new",
            EventKind::Processing => "processing",
            EventKind::Done => "done",
            EventKind::Fail => "fail",
            EventKind::Retrying => "retrying",
            EventKind::Expired => "expired",
            EventKind::Finished => "finished",
            EventKind::Reset => "reset",
            EventKind::StoreConnected => "store-connected",
            EventKind::StoreConnectionFail => "store-connection-fail",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle notification from the queue engine.
///
/// Listeners run synchronously on the emitting task, in registration
/// order. Anything slow, and any call back into the queue API, belongs in
/// a spawned task.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// The pending order was rebuilt from the store and dispatch begins.
    Ready {
        /// State as of reconciliation.
        state: StateSnapshot,
    },

    /// A job was persisted and appended to the pending order.
    New {
        /// Caller-assigned job id.
        job_id: String,
        /// The record as persisted.
        record: JobRecord,
    },

    /// A job is in flight. The handler must answer `completion` exactly
    /// once; dropping it unanswered counts as failure.
    Processing {
        /// Caller-assigned job id.
        job_id: String,
        /// The record as fetched from the store for this attempt.
        record: JobRecord,
        /// Reply handle for the outcome.
        completion: CompletionHandle,
    },

    /// The handler reported success and the job was removed.
    Done {
        /// Caller-assigned job id.
        job_id: String,
        /// The record at completion time.
        record: JobRecord,
        /// State after the removal.
        state: StateSnapshot,
    },

    /// The job's retry budget ran out.
    Fail {
        /// Caller-assigned job id.
        job_id: String,
        /// The record at its final failure.
        record: JobRecord,
    },

    /// The job failed with budget remaining and went back to the tail.
    Retrying {
        /// Caller-assigned job id.
        job_id: String,
        /// The record with its decremented budget.
        record: JobRecord,
    },

    /// The job's expiry deadline passed; it is removed only when `ack`
    /// confirms.
    Expired {
        /// Caller-assigned job id.
        job_id: String,
        /// The expired record.
        record: JobRecord,
        /// Archival acknowledgment handle.
        ack: ExpiryAck,
    },

    /// The pending order drained and the store had nothing more.
    Finished {
        /// State at the drain.
        state: StateSnapshot,
    },

    /// The queue was explicitly flushed.
    Reset {
        /// State after the flush.
        state: StateSnapshot,
    },

    /// Store connectivity established.
    StoreConnected,

    /// Store connectivity lost, or a listener panicked while handling an
    /// event.
    StoreConnectionFail {
        /// Description of the failure.
        error: String,
    },
}

impl QueueEvent {
    /// The event's discriminant.
    pub fn kind(&self) -> EventKind {
        match self {
            QueueEvent::Ready { .. } => EventKind::Ready,
            QueueEvent::New { .. } => EventKind::New,
            QueueEvent::Processing { .. } => EventKind::Processing,
            QueueEvent::Done { .. } => EventKind::Done,
            QueueEvent::Fail { .. } => EventKind::Fail,
            QueueEvent::Retrying { .. } => EventKind::Retrying,
            QueueEvent::Expired { .. } => EventKind::Expired,
            QueueEvent::Finished { .. } => EventKind::Finished,
            QueueEvent::Reset { .. } => EventKind::Reset,
            QueueEvent::StoreConnected => EventKind::StoreConnected,
            QueueEvent::StoreConnectionFail { .. } => EventKind::StoreConnectionFail,
        }
    }

    /// The job id this event concerns, when it concerns one.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            QueueEvent::New { job_id, .. }
            | QueueEvent::Processing { job_id, .. }
            | QueueEvent::Done { job_id, .. }
            | QueueEvent::Fail { job_id, .. }
            | QueueEvent::Retrying { job_id, .. }
            | QueueEvent::Expired { job_id, .. } => Some(job_id),
            _ => None,
        }
    }
}

/// Listener callback type.
pub type EventListener = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

/// Synchronous, ordered listener registry.
///
/// A panicking listener is caught and reported to the remaining listeners
/// as a `store-connection-fail` event, so one bad callback can neither
/// kill the loop nor silence the others. The report itself is delivered at
/// most once per emission; a panic out of the report is only logged.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<EventListener>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Registration order is delivery order.
    pub fn subscribe(&self, listener: impl Fn(&QueueEvent) + Send + Sync + 'static) {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver an event to every listener in order.
    pub fn emit(&self, event: &QueueEvent) {
        if let Some(description) = self.dispatch(event) {
            let report = QueueEvent::StoreConnectionFail { error: description };
            if let Some(second) = self.dispatch(&report) {
                error!(panic = %second, "Listener panicked while handling a panic report");
            }
        }
    }

    /// Run every listener; returns the first panic description, if any.
    fn dispatch(&self, event: &QueueEvent) -> Option<String> {
        // Snapshot outside the callbacks so a listener may subscribe
        // another listener without deadlocking; additions apply from the
        // next emission.
        let listeners: Vec<EventListener> = self.listeners.read().clone();

        let mut panicked = None;
        for listener in &listeners {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                let description = panic_description(&payload);
                warn!(event = %event.kind(), panic = %description, "Event listener panicked");
                if panicked.is_none() {
                    panicked = Some(description);
                }
            }
        }
        panicked
    }
}

fn panic_description(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
