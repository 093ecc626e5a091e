//! The command contract the queue engine requires from a store.

use async_trait::async_trait;

use crate::error::StoreResult;

/// Narrow async contract over a Redis-compatible hash store.
///
/// The queue engine only ever touches per-queue hashes plus whole-key
/// deletion, so the contract is deliberately small: five commands and a
/// connectivity probe. Implementations must be safe to call concurrently;
/// producers save jobs while the scheduler loop mutates them.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Write one field of a hash, overwriting any previous value.
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Read one field of a hash. `None` when the field is absent.
    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// Read every field of a hash as `(field, value)` pairs, in the
    /// store's field order. A missing key yields an empty list.
    ///
    /// Queue recovery rebuilds its dispatch order from this, so
    /// implementations should preserve whatever order the store reports
    /// (Redis keeps insertion order for small hashes).
    async fn hash_get_all(&self, key: &str) -> StoreResult<Vec<(String, String)>>;

    /// Delete one field of a hash. Deleting an absent field is not an error.
    async fn hash_delete(&self, key: &str, field: &str) -> StoreResult<()>;

    /// Delete an entire key. Deleting an absent key is not an error.
    async fn delete_key(&self, key: &str) -> StoreResult<()>;

    /// Probe connectivity. `Ok` means the store answered just now.
    async fn ping(&self) -> StoreResult<()>;
}
