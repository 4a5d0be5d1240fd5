//! Redis-backed [`SharedStateStore`] with automatic reconnection.

use super::{SharedStateStore, StoreError, StoreResult};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, RedisError};

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() {
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Backend(e.to_string())
        }
    }
}

impl RedisStore {
    /// Connect to Redis. Supports both redis:// and rediss:// (TLS) URLs.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl SharedStateStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.conn().get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        let () = self.conn().set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        Ok(self.conn().incr(key, 1_i64).await?)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        let seconds = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        Ok(self.conn().expire(key, seconds).await?)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.conn().exists(key).await?)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<u64>> {
        // -2: no such key, -1: no expiry
        let ttl: i64 = self.conn().ttl(key).await?;
        Ok(u64::try_from(ttl).ok())
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        let removed: i64 = self.conn().del(key).await?;
        Ok(removed > 0)
    }
}
