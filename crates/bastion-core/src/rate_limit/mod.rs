//! Fixed-window rate limiting with a penalty block, backed by the shared store.
//!
//! Keys:
//! - `rate-limit:{key}`: request counter, expires with the window
//! - `rate-limit:block:{key}`: block flag, expires with the penalty
//!
//! The limiter fails open: if the store cannot be reached the request is
//! allowed and the outage is logged and counted.

mod key;


pub use bastion_types::{LimiterStats, RateLimitConfig, RateLimitInfo};
pub use key::RateLimitKey;

use crate::prometheus;
use crate::store::{SharedStateStore, StoreError};
use bastion_types::GatewayError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

fn counter_key(key: &str) -> String {
    format!("rate-limit:{key}")
}

fn block_key(key: &str) -> String {
    format!("rate-limit:block:{key}")
}

enum Verdict {
    Allow,
    Reject { retry_after_secs: u64, from_block: bool },
}

#[derive(Default)]
struct Counters {
    checks: AtomicU64,
    allowed: AtomicU64,
    rejected: AtomicU64,
    blocked: AtomicU64,
    warnings: AtomicU64,
    store_errors: AtomicU64,
}

pub struct RateLimiter {
    store: Arc<dyn SharedStateStore>,
    warn_ratio: f64,
    counters: Counters,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn SharedStateStore>) -> Self {
        Self::with_warn_ratio(store, 0.8)
    }

    pub fn with_warn_ratio(store: Arc<dyn SharedStateStore>, warn_ratio: f64) -> Self {
        Self { store, warn_ratio, counters: Counters::default() }
    }

    /// Count one request against `key`.
    ///
    /// Returns [`GatewayError::RateLimitExceeded`] while the key is blocked or
    /// once its window budget is spent.
    pub async fn check_limit(&self, key: &str, config: &RateLimitConfig) -> Result<(), GatewayError> {
        self.counters.checks.fetch_add(1, Ordering::Relaxed);

        match self.evaluate(key, config).await {
            Ok(Verdict::Allow) => {
                self.counters.allowed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            Ok(Verdict::Reject { retry_after_secs, from_block }) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                if from_block {
                    self.counters.blocked.fetch_add(1, Ordering::Relaxed);
                }
                prometheus::record_rate_limit_rejection();
                warn!(key = %key, retry_after_secs, "Rate limit exceeded");
                Err(GatewayError::RateLimitExceeded { key: key.to_string(), retry_after_secs })
            },
            Err(e) => {
                self.counters.store_errors.fetch_add(1, Ordering::Relaxed);
                self.counters.allowed.fetch_add(1, Ordering::Relaxed);
                prometheus::record_rate_limit_store_error();
                warn!(key = %key, error = %e, "Rate limit store unreachable, allowing request");
                Ok(())
            },
        }
    }

    async fn evaluate(&self, key: &str, config: &RateLimitConfig) -> Result<Verdict, StoreError> {
        let block = block_key(key);
        if self.store.exists(&block).await? {
            let remaining = self.store.ttl(&block).await?.unwrap_or(config.block_duration_secs);
            return Ok(Verdict::Reject { retry_after_secs: remaining.max(1), from_block: true });
        }

        let counter = counter_key(key);
        let count = self.store.incr(&counter).await?;
        if count == 1 {
            self.store.expire(&counter, config.duration_secs).await?;
        }
        let count = u64::try_from(count).unwrap_or(0);

        if count > config.points {
            self.store.set_ex(&block, "1", config.block_duration_secs).await?;
            return Ok(Verdict::Reject {
                retry_after_secs: config.block_duration_secs,
                from_block: false,
            });
        }

        if count as f64 > self.warn_ratio * config.points as f64 {
            self.counters.warnings.fetch_add(1, Ordering::Relaxed);
            prometheus::record_rate_limit_warning();
            debug!(key = %key, count, points = config.points, "Approaching rate limit");
        }

        Ok(Verdict::Allow)
    }

    /// Clear both the counter and any block for `key`.
    pub async fn reset_limit(&self, key: &str) -> Result<(), GatewayError> {
        self.store.del(&counter_key(key)).await?;
        self.store.del(&block_key(key)).await?;
        debug!(key = %key, "Rate limit reset manually");
        Ok(())
    }

    pub async fn get_info(&self, key: &str) -> Result<RateLimitInfo, GatewayError> {
        let counter = counter_key(key);
        let block = block_key(key);

        let count = match self.store.get(&counter).await? {
            Some(raw) => raw.parse().unwrap_or(0),
            None => 0,
        };
        let blocked = self.store.exists(&block).await?;
        let block_ttl_secs = if blocked { self.store.ttl(&block).await? } else { None };

        Ok(RateLimitInfo {
            key: key.to_string(),
            count,
            window_ttl_secs: self.store.ttl(&counter).await?,
            blocked,
            block_ttl_secs,
        })
    }

    pub fn stats(&self) -> LimiterStats {
        let c = &self.counters;
        LimiterStats {
            checks: c.checks.load(Ordering::Relaxed),
            allowed: c.allowed.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            blocked: c.blocked.load(Ordering::Relaxed),
            warnings: c.warnings.load(Ordering::Relaxed),
            store_errors: c.store_errors.load(Ordering::Relaxed),
        }
    }
}
