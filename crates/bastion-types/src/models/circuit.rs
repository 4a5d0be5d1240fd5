//! Circuit breaker models.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Per-dependency breaker configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct CircuitConfig {
    /// Consecutive dependency failures before the circuit opens
    #[validate(range(min = 1_u32))]
    pub failure_threshold: u32,
    /// Consecutive half-open successes before the circuit closes
    #[validate(range(min = 1_u32))]
    pub success_threshold: u32,
    /// Milliseconds to stay open before letting a trial call through
    pub open_timeout_ms: u64,
    /// Informational; reported to the dashboard only
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

fn default_reset_timeout_ms() -> u64 {
    30_000
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout_ms: 60_000,
            reset_timeout_ms: default_reset_timeout_ms(),
        }
    }
}

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - requests pass through
    #[default]
    Closed,
    /// Dependency is failing - requests fail immediately
    Open,
    /// Testing recovery - trial requests allowed
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Breaker state as persisted under `circuit:{dependency}`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CircuitRecord {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// Unix epoch milliseconds of the last dependency failure
    #[serde(default)]
    pub last_failure_at: Option<i64>,
}

/// One dependency's breaker as reported to the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub dependency: String,
    #[serde(flatten)]
    pub record: CircuitRecord,
}

/// Summary of circuit breaker states across all known dependencies
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CircuitStats {
    pub closed: usize,
    pub open: usize,
    pub half_open: usize,
    pub total_trips: u64,
    pub short_circuits: u64,
}
