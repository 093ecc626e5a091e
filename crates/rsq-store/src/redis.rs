//! Redis-backed store adapter.

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use tracing::info;

use crate::adapter::StoreAdapter;
use crate::error::{StoreError, StoreResult};

/// Pool size used by [`RedisStore::open`]. A queue runs one consumer loop
/// plus its producers, so a handful of connections is plenty.
const DEFAULT_POOL_SIZE: usize = 4;

/// Create a Redis connection pool and verify it with a `PING`.
pub async fn create_pool(url: &str, pool_size: usize) -> StoreResult<Pool> {
    info!("Creating Redis connection pool for queue store...");

    let cfg = Config::from_url(url);

    let pool = cfg
        .builder()
        .map_err(|e| StoreError::Configuration(format!("Invalid Redis config: {}", e)))?
        .max_size(pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| StoreError::Configuration(format!("Failed to create pool: {}", e)))?;

    // Test connection
    let mut conn = pool.get().await?;
    redis::cmd("PING").query_async::<String>(&mut *conn).await?;

    info!("Redis connection pool created successfully");

    Ok(pool)
}

/// Store adapter over a pooled Redis connection.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Wrap an existing pool, for applications that share one.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a store for the given URL without touching the network.
    ///
    /// Connections are established lazily on first use, which suits the
    /// queue loop: it probes with [`ping`](StoreAdapter::ping) until the
    /// store answers rather than failing at construction. Use
    /// [`create_pool`] instead when fail-fast startup is wanted.
    pub fn open(url: &str) -> StoreResult<Self> {
        let cfg = Config::from_url(url);

        let pool = cfg
            .builder()
            .map_err(|e| StoreError::Configuration(format!("Invalid Redis config: {}", e)))?
            .max_size(DEFAULT_POOL_SIZE)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| StoreError::Configuration(format!("Failed to create pool: {}", e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl StoreAdapter for RedisStore {
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.pool.get().await?;
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        let mut conn = self.pool.get().await?;
        let fields: Vec<(String, String)> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn hash_delete(&self, key: &str, field: &str) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        let _: () = conn.hdel(key, field).await?;
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        redis::cmd("PING").query_async::<String>(&mut *conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_create_pool_rejects_a_malformed_url() {
        match create_pool("not a redis url", 2).await {
            Err(StoreError::Configuration(reason)) => {
                assert!(reason.contains("Invalid Redis config"));
            }
            _ => panic!("a malformed URL must be a configuration error"),
        }
    }

    #[test]
    fn test_new_wraps_a_shared_pool_without_connecting() {
        let pool = Config::from_url("redis://localhost:6379")
            .builder()
            .expect("pool config")
            .max_size(2)
            .runtime(Runtime::Tokio1)
            .build()
            .expect("lazy pool");

        let store = RedisStore::new(pool);
        let status = store.pool.status();
        assert_eq!(status.max_size, 2);
        assert_eq!(status.size, 0);

        // Usable wherever the queue takes its store.
        let _store: Arc<dyn StoreAdapter> = Arc::new(store);
    }

    #[test]
    fn test_open_is_lazy_with_the_default_pool_size() {
        let store = RedisStore::open("redis://localhost:6379").expect("store");
        let status = store.pool.status();
        assert_eq!(status.max_size, DEFAULT_POOL_SIZE);
        assert_eq!(status.size, 0);

        match RedisStore::open("not a redis url") {
            Err(StoreError::Configuration(_)) => {}
            _ => panic!("a malformed URL must be a configuration error"),
        }
    }
}
