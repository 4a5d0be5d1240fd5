use super::state::{self, Change, CircuitRecord, CircuitSnapshot, CircuitState, CircuitStats};
use super::{circuit_key, now_ms, CircuitBreaker};
use crate::prometheus;
use bastion_types::GatewayError;
use futures::future::join_all;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

impl CircuitBreaker {
    /// Record a successful call (or a client error) for a dependency.
    pub async fn record_success(&self, dependency: &str) {
        let mut record = self.load(dependency).await;
        let change = state::on_success(&mut record, &self.config);
        if let Change::Transition { to: CircuitState::Closed, .. } = change {
            info!(dependency = %dependency, "Circuit breaker closing - dependency recovered");
        }
        self.persist(dependency, &record, change, "Dependency recovered").await;
    }

    /// Record a dependency failure.
    pub async fn record_failure(&self, dependency: &str, err: &GatewayError) {
        let mut record = self.load(dependency).await;
        let change = state::on_failure(&mut record, &self.config, now_ms());
        match change {
            Change::Transition { from: CircuitState::HalfOpen, .. } => {
                self.total_trips.fetch_add(1, Ordering::Relaxed);
                warn!(
                    dependency = %dependency,
                    reason = %err,
                    "Circuit breaker re-opening - failure during half-open"
                );
            },
            Change::Transition { .. } => {
                self.total_trips.fetch_add(1, Ordering::Relaxed);
                warn!(
                    dependency = %dependency,
                    failures = record.consecutive_failures,
                    reason = %err,
                    "Circuit breaker opening - too many failures"
                );
            },
            Change::Counters | Change::Unchanged => {},
        }
        self.persist(dependency, &record, change, &err.to_string()).await;
    }

    pub(super) fn log_state_change(
        dependency: &str,
        previous_state: CircuitState,
        new_state: CircuitState,
        reason: &str,
    ) {
        prometheus::record_circuit_transition(dependency, &new_state.to_string());
        info!(
            "Circuit breaker state change: {} {} -> {} (reason: {})",
            dependency, previous_state, new_state, reason
        );
    }

    /// Stored state of a dependency's circuit. Does not apply the open timeout;
    /// an expired Open circuit moves to HalfOpen on its next call.
    pub async fn get_state(&self, dependency: &str) -> CircuitState {
        self.load(dependency).await.state
    }

    pub async fn get_record(&self, dependency: &str) -> CircuitRecord {
        self.load(dependency).await
    }

    pub fn total_trips(&self) -> u64 {
        self.total_trips.load(Ordering::Relaxed)
    }

    pub fn short_circuits(&self) -> u64 {
        self.short_circuits.load(Ordering::Relaxed)
    }

    /// Force a dependency's circuit back to Closed with zeroed counters.
    pub async fn reset(&self, dependency: &str) -> Result<(), GatewayError> {
        let previous_state = self.load(dependency).await.state;
        info!(
            dependency = %dependency,
            previous_state = %previous_state,
            "Circuit breaker reset manually"
        );
        self.store.del(&circuit_key(dependency)).await?;
        if previous_state != CircuitState::Closed {
            Self::log_state_change(dependency, previous_state, CircuitState::Closed, "Manual reset");
        }
        Ok(())
    }

    /// Snapshots of every dependency this instance has seen, sorted by name.
    pub async fn get_all(&self) -> Vec<CircuitSnapshot> {
        let dependencies: Vec<String> = self.known.read().iter().cloned().collect();
        join_all(dependencies.into_iter().map(|dependency| async move {
            let record = self.load(&dependency).await;
            CircuitSnapshot { dependency, record }
        }))
        .await
    }

    pub async fn get_summary(&self) -> CircuitStats {
        let mut closed = 0;
        let mut open = 0;
        let mut half_open = 0;

        for snapshot in self.get_all().await {
            match snapshot.record.state {
                CircuitState::Closed => closed += 1,
                CircuitState::Open => open += 1,
                CircuitState::HalfOpen => half_open += 1,
            }
        }

        CircuitStats {
            closed,
            open,
            half_open,
            total_trips: self.total_trips(),
            short_circuits: self.short_circuits(),
        }
    }
}
