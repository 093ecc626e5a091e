//! In-memory store adapter for tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::adapter::StoreAdapter;
use crate::error::{StoreError, StoreResult};

/// Hash store backed by process memory.
///
/// Mirrors [`RedisStore`](crate::RedisStore) semantics closely enough for
/// engine tests: absent fields read as `None`, deletes are idempotent, and
/// fields keep their insertion order the way small Redis hashes do. The
/// availability switch makes connectivity loss scriptable; while switched
/// off every operation fails with [`StoreError::Unavailable`].
pub struct MemoryStore {
    // Each hash as ordered (field, value) pairs. Linear lookup is fine at
    // test scale and keeps field order exact.
    keys: RwLock<HashMap<String, Vec<(String, String)>>>,
    available: AtomicBool,
}

impl MemoryStore {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Flip the availability switch.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of fields currently stored under `key`.
    pub fn field_count(&self, key: &str) -> usize {
        self.keys.read().get(key).map_or(0, Vec::len)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable("memory store offline"))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.check_available()?;
        let mut keys = self.keys.write();
        let fields = keys.entry(key.to_string()).or_default();
        match fields.iter_mut().find(|(f, _)| f == field) {
            Some((_, existing)) => *existing = value.to_string(),
            None => fields.push((field.to_string(), value.to_string())),
        }
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.check_available()?;
        Ok(self.keys.read().get(key).and_then(|fields| {
            fields
                .iter()
                .find(|(f, _)| f == field)
                .map(|(_, value)| value.clone())
        }))
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        self.check_available()?;
        Ok(self.keys.read().get(key).cloned().unwrap_or_default())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> StoreResult<()> {
        self.check_available()?;
        if let Some(fields) = self.keys.write().get_mut(key) {
            fields.retain(|(f, _)| f != field);
        }
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> StoreResult<()> {
        self.check_available()?;
        self.keys.write().remove(key);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = MemoryStore::new();
        store.hash_set("h", "a", "1").await.expect("set");
        assert_eq!(
            store.hash_get("h", "a").await.expect("get"),
            Some("1".to_string())
        );
    }

    #[tokio::test]
    async fn test_set_overwrites_in_place() {
        let store = MemoryStore::new();
        store.hash_set("h", "a", "1").await.expect("set");
        store.hash_set("h", "b", "2").await.expect("set");
        store.hash_set("h", "a", "updated").await.expect("overwrite");

        let fields = store.hash_get_all("h").await.expect("get all");
        assert_eq!(
            fields,
            vec![
                ("a".to_string(), "updated".to_string()),
                ("b".to_string(), "2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_absent_field_reads_none() {
        let store = MemoryStore::new();
        assert_eq!(store.hash_get("h", "missing").await.expect("get"), None);
    }

    #[tokio::test]
    async fn test_get_all_preserves_insertion_order() {
        let store = MemoryStore::new();
        for (field, value) in [("z", "1"), ("a", "2"), ("m", "3")] {
            store.hash_set("h", field, value).await.expect("set");
        }

        let order: Vec<String> = store
            .hash_get_all("h")
            .await
            .expect("get all")
            .into_iter()
            .map(|(field, _)| field)
            .collect();
        assert_eq!(order, vec!["z", "a", "m"]);
    }

    #[tokio::test]
    async fn test_get_all_missing_key_is_empty() {
        let store = MemoryStore::new();
        let fields = store.hash_get_all("nope").await.expect("get all");
        assert!(fields.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.hash_set("h", "a", "1").await.expect("set");
        store.hash_delete("h", "a").await.expect("delete");
        store.hash_delete("h", "a").await.expect("delete again");
        assert_eq!(store.field_count("h"), 0);
    }

    #[tokio::test]
    async fn test_delete_key_drops_all_fields() {
        let store = MemoryStore::new();
        store.hash_set("h", "a", "1").await.expect("set");
        store.hash_set("h", "b", "2").await.expect("set");
        store.delete_key("h").await.expect("delete key");
        assert_eq!(store.field_count("h"), 0);
    }

    #[tokio::test]
    async fn test_unavailable_store_rejects_everything() {
        let store = MemoryStore::new();
        store.set_available(false);

        assert!(store.ping().await.is_err());
        assert!(store.hash_set("h", "a", "1").await.is_err());
        assert!(store.hash_get("h", "a").await.is_err());

        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }
}
