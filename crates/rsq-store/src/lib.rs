//! Durable hash-store adapter for the RSQ job queue.
//!
//! The queue engine persists every job inside a per-queue hash and treats
//! that hash as the authoritative copy of the queue. This crate defines the
//! narrow command contract the engine relies on ([`StoreAdapter`]) together
//! with two implementations:
//!
//! - [`RedisStore`] — production backend over a pooled Redis connection
//! - [`MemoryStore`] — in-process twin for tests and local development,
//!   with a scriptable availability switch for outage scenarios
//!
//! [`QueueKeys`] pins down the key layout shared by every backend.

pub mod adapter;
pub mod error;
pub mod keys;
pub mod memory;
pub mod redis;

pub use adapter::StoreAdapter;
pub use error::{StoreError, StoreResult};
pub use keys::QueueKeys;
pub use memory::MemoryStore;
pub use self::redis::{create_pool, RedisStore};
