//! Circuit Breaker implementation for dependency-level fast-fail behavior
//!
//! This module provides a circuit breaker pattern to prevent repeated calls to
//! failing downstream services. When a dependency experiences multiple
//! consecutive failures, the circuit breaker opens and subsequent calls fail
//! fast (or return the caller's fallback) without touching the dependency.
//!
//! States:
//! - Closed: Normal operation, calls pass through
//! - Open: Dependency is failing, calls are short-circuited
//! - Half-Open: Open timeout elapsed, trial calls test recovery
//!
//! State is kept in the [`SharedStateStore`] under `circuit:{dependency}` so
//! all gateway instances share it. Half-open does not serialize trial calls:
//! concurrent callers (or instances) may each send one.

mod recording;
mod state;

#[cfg(test)]
mod tests;

pub use state::{CircuitConfig, CircuitRecord, CircuitSnapshot, CircuitState, CircuitStats};

use crate::prometheus;
use crate::store::SharedStateStore;
use bastion_types::GatewayError;
use parking_lot::RwLock;
use state::{Admission, Change};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "circuit:";

fn circuit_key(dependency: &str) -> String {
    format!("{KEY_PREFIX}{dependency}")
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Manages circuit breakers for all dependencies
pub struct CircuitBreaker {
    config: CircuitConfig,
    state_ttl_secs: u64,
    store: Arc<dyn SharedStateStore>,
    /// Dependencies this process has seen, for the admin listing
    known: RwLock<BTreeSet<String>>,
    total_trips: AtomicU64,
    short_circuits: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitConfig, store: Arc<dyn SharedStateStore>) -> Self {
        Self::with_state_ttl(config, store, 86_400)
    }

    pub fn with_state_ttl(
        config: CircuitConfig,
        store: Arc<dyn SharedStateStore>,
        state_ttl_secs: u64,
    ) -> Self {
        Self {
            config,
            state_ttl_secs,
            store,
            known: RwLock::new(BTreeSet::new()),
            total_trips: AtomicU64::new(0),
            short_circuits: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Make a dependency show up in listings before its first call.
    pub fn register(&self, dependency: &str) {
        if self.known.read().contains(dependency) {
            return;
        }
        self.known.write().insert(dependency.to_string());
    }

    /// Run `operation` under the dependency's breaker.
    ///
    /// Short-circuits with [`GatewayError::CircuitOpen`] while open. Dependency
    /// failures are absorbed and surface as [`GatewayError::ServiceUnavailable`];
    /// client errors pass through unchanged and count as successes.
    pub async fn execute<T, F, Fut>(&self, dependency: &str, operation: F) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        self.run(dependency, operation, None::<fn(GatewayError) -> T>).await
    }

    /// Like [`execute`](Self::execute), but short-circuits and dependency
    /// failures resolve to `fallback(error)` instead of an error.
    pub async fn execute_with_fallback<T, F, Fut, FB>(
        &self,
        dependency: &str,
        operation: F,
        fallback: FB,
    ) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
        FB: FnOnce(GatewayError) -> T,
    {
        self.run(dependency, operation, Some(fallback)).await
    }

    async fn run<T, F, Fut, FB>(
        &self,
        dependency: &str,
        operation: F,
        fallback: Option<FB>,
    ) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
        FB: FnOnce(GatewayError) -> T,
    {
        self.register(dependency);

        let mut record = self.load(dependency).await;
        match state::admit(&mut record, &self.config, now_ms()) {
            Admission::Reject { retry_after_ms } => {
                self.short_circuits.fetch_add(1, Ordering::Relaxed);
                prometheus::record_short_circuit(dependency);
                debug!(
                    dependency = %dependency,
                    retry_after_ms,
                    "Circuit open - short-circuiting call"
                );
                let err = GatewayError::CircuitOpen {
                    dependency: dependency.to_string(),
                    retry_after_ms,
                };
                return match fallback {
                    Some(fallback) => Ok(fallback(err)),
                    None => Err(err),
                };
            },
            Admission::Trial => {
                self.persist(
                    dependency,
                    &record,
                    Change::Transition { from: CircuitState::Open, to: CircuitState::HalfOpen },
                    "Open timeout elapsed, testing recovery",
                )
                .await;
            },
            Admission::Proceed => {},
        }

        match operation().await {
            Ok(value) => {
                self.record_success(dependency).await;
                Ok(value)
            },
            Err(err) if err.should_trip_circuit() => {
                self.record_failure(dependency, &err).await;
                match fallback {
                    Some(fallback) => Ok(fallback(err)),
                    None => Err(GatewayError::ServiceUnavailable {
                        dependency: dependency.to_string(),
                        message: err.to_string(),
                    }),
                }
            },
            Err(err) if err.is_client_error() => {
                // The dependency answered; that is a healthy dependency.
                self.record_success(dependency).await;
                Err(err)
            },
            Err(err) => Err(err),
        }
    }

    /// Read the record; an unreadable store behaves like a fresh, closed circuit.
    async fn load(&self, dependency: &str) -> CircuitRecord {
        match self.store.get(&circuit_key(dependency)).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(dependency = %dependency, error = %e, "Discarding corrupt circuit state");
                CircuitRecord::default()
            }),
            Ok(None) => CircuitRecord::default(),
            Err(e) => {
                warn!(dependency = %dependency, error = %e, "Circuit state unreadable, assuming closed");
                CircuitRecord::default()
            },
        }
    }

    async fn persist(&self, dependency: &str, record: &CircuitRecord, change: Change, reason: &str) {
        if !change.is_dirty() {
            return;
        }
        if let Change::Transition { from, to } = change {
            Self::log_state_change(dependency, from, to, reason);
        }

        let raw = match serde_json::to_string(record) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(dependency = %dependency, error = %e, "Failed to encode circuit state");
                return;
            },
        };
        if let Err(e) = self.store.set_ex(&circuit_key(dependency), &raw, self.state_ttl_secs).await
        {
            warn!(dependency = %dependency, error = %e, "Failed to persist circuit state");
        }
    }
}
