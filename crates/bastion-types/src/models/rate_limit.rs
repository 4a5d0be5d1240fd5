//! Rate limiting models.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Budget for one class of rate-limit key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    #[validate(range(min = 1_u64))]
    pub points: u64,
    /// Window length in seconds
    #[validate(range(min = 1_u64))]
    pub duration_secs: u64,
    /// Penalty block applied once the budget is exceeded, in seconds
    #[validate(range(min = 1_u64))]
    pub block_duration_secs: u64,
}

impl RateLimitConfig {
    pub const fn new(points: u64, duration_secs: u64, block_duration_secs: u64) -> Self {
        Self { points, duration_secs, block_duration_secs }
    }
}

/// Budgets for the three call sites: authenticated user (global),
/// authenticated user per service, and anonymous client IP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct RateLimitPolicy {
    #[validate(nested)]
    pub user: RateLimitConfig,
    #[validate(nested)]
    pub user_service: RateLimitConfig,
    #[validate(nested)]
    pub ip: RateLimitConfig,
    /// Fraction of the budget past which an "approaching limit" signal fires
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_warn_ratio")]
    pub warn_ratio: f64,
}

fn default_warn_ratio() -> f64 {
    0.8
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            user: RateLimitConfig::new(100, 60, 300),
            user_service: RateLimitConfig::new(50, 60, 120),
            ip: RateLimitConfig::new(30, 60, 600),
            warn_ratio: default_warn_ratio(),
        }
    }
}

/// Current counter and block state for one key, for the dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub key: String,
    pub count: u64,
    /// Seconds until the window counter expires, if a window is active
    pub window_ttl_secs: Option<u64>,
    pub blocked: bool,
    /// Seconds until the block flag expires, if blocked
    pub block_ttl_secs: Option<u64>,
}

/// Process-local limiter counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimiterStats {
    pub checks: u64,
    pub allowed: u64,
    pub rejected: u64,
    /// Rejections served straight from an active block flag
    pub blocked: u64,
    pub warnings: u64,
    /// Checks allowed because the store was unreachable
    pub store_errors: u64,
}
