//! # RSQ Core
//!
//! Durable, single-consumer job queue engine over a Redis-compatible hash
//! store.
//!
//! ## Features
//!
//! - **Durable by default**: every job is persisted before it is queued,
//!   and the store stays the authoritative copy of the queue
//! - **Single-consumer dispatch**: one timer-driven loop hands out one job
//!   at a time, in FIFO order with rotate-on-failure
//! - **Retry budgets**: per-job finite or unlimited retries, with failed
//!   payloads archived in a fail-hash once the budget runs out
//! - **Delays and expirations**: per-job start delays and absolute expiry
//!   deadlines with acknowledged removal
//! - **Crash recovery**: on every (re)connect the pending order is rebuilt
//!   from the store, so restarts and outages lose nothing
//! - **Synchronous event bus**: `ready`, `new`, `processing`, `done`,
//!   `fail`, `retrying`, `expired`, `finished`, `reset` plus store
//!   connectivity events, with panic isolation per listener
//!
//! ## Architecture
//!
//! ```text
//!   producers                    scheduler loop                 store
//!  ┌───────────┐   save()   ┌──────────────────────┐   ┌─────────────────┐
//!  │ JobBuilder├───────────►│ peek head            │   │ rq:Q:jobs       │
//!  └───────────┘            │ fetch record ────────┼──►│ rq:Q:done       │
//!  ┌───────────┐   events   │ wait delay/debounce  │   │ rq:Q:fail       │
//!  │ listeners │◄───────────┤ dispatch / expire /  │   └─────────────────┘
//!  └─────┬─────┘            │ consume exhausted    │        ▲
//!        │ complete()       │ apply outcome ───────┼────────┘
//!        └─────────────────►│ rotate or remove     │
//!                           └──────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use rsq_core::{Outcome, Queue, QueueConfig, QueueEvent};
//!
//! let queue = Queue::new("orders", QueueConfig::default())?;
//!
//! queue.on(|event| {
//!     if let QueueEvent::Processing { record, completion, .. } = event {
//!         let completion = completion.clone();
//!         let payload = record.data.clone();
//!         tokio::spawn(async move {
//!             // ... do the work ...
//!             let _ = completion.complete(Outcome::Success);
//!         });
//!     }
//! });
//!
//! queue.create_job("order-1", r#"{"sku":"widget"}"#)
//!     .retries(3)
//!     .delay_until(500)
//!     .save()
//!     .await?;
//!
//! queue.run().await?;
//! ```

pub mod builder;
pub mod completion;
pub mod config;
pub mod error;
pub mod events;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod state;

mod scheduler;

pub use builder::JobBuilder;
pub use completion::{CompletionHandle, ExpiryAck, Outcome};
pub use config::QueueConfig;
pub use error::{QueueError, QueueResult};
pub use events::{EventKind, QueueEvent};
pub use job::{JobOptions, JobRecord};
pub use queue::{Queue, QueueStats};
pub use state::StateSnapshot;

// Store backends, re-exported for one-stop construction.
pub use rsq_store::{MemoryStore, QueueKeys, RedisStore, StoreAdapter, StoreError};

/// Commonly used types.
pub mod prelude {
    pub use crate::builder::JobBuilder;
    pub use crate::completion::{CompletionHandle, ExpiryAck, Outcome};
    pub use crate::config::QueueConfig;
    pub use crate::error::{QueueError, QueueResult};
    pub use crate::events::{EventKind, QueueEvent};
    pub use crate::job::{JobOptions, JobRecord};
    pub use crate::queue::{Queue, QueueStats};
    pub use crate::state::StateSnapshot;
}
