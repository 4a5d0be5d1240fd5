//! Gateway errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while routing, protecting, or orchestrating a request.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum GatewayError {
    /// No service owns the requested prefix
    #[error("No service registered for prefix '{prefix}'")]
    NotFound { prefix: String },

    /// Downstream answered with a 4xx. The dependency is healthy; the body is
    /// passed back to the caller unchanged.
    #[error("Downstream rejected request with status {status}")]
    ClientError { status: u16, body: serde_json::Value },

    /// Downstream answered with a 5xx or the transport failed
    #[error("Dependency {dependency} failed: {message}")]
    DependencyFailure { dependency: String, message: String },

    /// Downstream did not answer in time
    #[error("Dependency {dependency} timed out after {duration_ms}ms")]
    Timeout { dependency: String, duration_ms: u64 },

    /// Circuit breaker short-circuited the call; the operation never ran
    #[error("Circuit breaker open for {dependency}, retry in {retry_after_ms}ms")]
    CircuitOpen { dependency: String, retry_after_ms: u64 },

    /// Generic unavailability raised when a dependency failure is absorbed
    /// without a fallback
    #[error("Service {dependency} temporarily unavailable")]
    ServiceUnavailable { dependency: String, message: String },

    /// Request budget exhausted for a rate-limit key
    #[error("Rate limit exceeded for {key}, retry after {retry_after_secs}s")]
    RateLimitExceeded { key: String, retry_after_secs: u64 },

    /// A command could not be handed to the command bus
    #[error("Failed to publish to {topic}: {message}")]
    PublishFailure { topic: String, message: String },

    /// No reply arrived for an awaited command
    #[error("No reply for {correlation_id} within {timeout_ms}ms")]
    ReplyTimeout { correlation_id: String, timeout_ms: u64 },

    /// Reply arrived but carried a failure
    #[error("Command {correlation_id} failed: {message}")]
    ReplyRejected { correlation_id: String, message: String },

    /// Shared state store unreachable or returned garbage
    #[error("State store error: {message}")]
    Store { message: String },

    /// Internal gateway error (bugs, unexpected states)
    #[error("Internal gateway error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Check if this error counts toward a dependency's failure threshold.
    pub fn should_trip_circuit(&self) -> bool {
        matches!(self, Self::DependencyFailure { .. } | Self::Timeout { .. })
    }

    /// Check if this is a client error (4xx equivalent). The dependency
    /// responded, so breakers treat these as successes.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ClientError { .. } | Self::NotFound { .. })
    }

    /// Retry hint in seconds, when the error carries one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimitExceeded { retry_after_secs, .. } => Some(*retry_after_secs),
            Self::CircuitOpen { retry_after_ms, .. } => Some(retry_after_ms.div_ceil(1000)),
            _ => None,
        }
    }

    /// Get HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::ClientError { status, .. } => *status,
            Self::DependencyFailure { .. } | Self::PublishFailure { .. } => 502,
            Self::ReplyRejected { .. } => 422,
            Self::Timeout { .. } | Self::ReplyTimeout { .. } => 504,
            Self::CircuitOpen { .. } | Self::ServiceUnavailable { .. } => 503,
            Self::RateLimitExceeded { .. } => 429,
            Self::Store { .. } | Self::Internal { .. } => 500,
        }
    }
}
