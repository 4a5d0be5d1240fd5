//! Shared state store seam.
//!
//! Breaker and limiter state lives in a low-latency key-value store so that
//! every gateway instance sees the same counters. The decision logic only
//! talks to [`SharedStateStore`]; [`InMemoryStore`] backs single-instance
//! deployments and tests, `RedisStore` (feature `redis`) backs clusters.

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

use async_trait::async_trait;
use bastion_types::GatewayError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("value at {key} is not an integer")]
    NotAnInteger { key: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        GatewayError::Store { message: e.to_string() }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value store with TTL and atomic increment.
///
/// Every operation is a single-key read or write; implementations are not
/// required to offer cross-key atomicity.
#[async_trait]
pub trait SharedStateStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write `value` and (re)set its expiry.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()>;

    /// Atomically increment an integer counter, creating it at 0 first.
    /// Returns the post-increment value. Does not touch the expiry.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Set the expiry of an existing key. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Remaining time to live in seconds; `None` if the key is absent or has
    /// no expiry.
    async fn ttl(&self, key: &str) -> StoreResult<Option<u64>>;

    /// Returns true if a key was removed.
    async fn del(&self, key: &str) -> StoreResult<bool>;
}
