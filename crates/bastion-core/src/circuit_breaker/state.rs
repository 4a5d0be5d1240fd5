//! Circuit breaker state types and pure transition rules.
//!
//! Nothing here touches the store; [`super::CircuitBreaker`] loads a record,
//! applies one of these functions, and writes the result back.

pub use bastion_types::{CircuitConfig, CircuitRecord, CircuitSnapshot, CircuitState, CircuitStats};

/// Whether a call may reach the dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Closed or HalfOpen: call through
    Proceed,
    /// Was Open and the open timeout elapsed; record is now HalfOpen
    Trial,
    /// Still Open; the operation must not run
    Reject { retry_after_ms: u64 },
}

/// What a recorded outcome did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Change {
    Unchanged,
    Counters,
    Transition { from: CircuitState, to: CircuitState },
}

impl Change {
    pub(crate) fn is_dirty(self) -> bool {
        !matches!(self, Change::Unchanged)
    }
}

fn enter_half_open(record: &mut CircuitRecord) {
    record.state = CircuitState::HalfOpen;
    record.consecutive_failures = 0;
    record.consecutive_successes = 0;
}

pub(crate) fn admit(record: &mut CircuitRecord, config: &CircuitConfig, now_ms: i64) -> Admission {
    match record.state {
        CircuitState::Open => {
            let timeout = i64::try_from(config.open_timeout_ms).unwrap_or(i64::MAX);
            let elapsed = record.last_failure_at.map_or(timeout, |at| now_ms.saturating_sub(at));
            if elapsed < timeout {
                let remaining = timeout.saturating_sub(elapsed.max(0));
                return Admission::Reject { retry_after_ms: u64::try_from(remaining).unwrap_or(0) };
            }
            enter_half_open(record);
            Admission::Trial
        },
        CircuitState::Closed | CircuitState::HalfOpen => Admission::Proceed,
    }
}

pub(crate) fn on_success(record: &mut CircuitRecord, config: &CircuitConfig) -> Change {
    match record.state {
        CircuitState::Closed => {
            if record.consecutive_failures == 0 {
                return Change::Unchanged;
            }
            record.consecutive_failures = 0;
            Change::Counters
        },
        CircuitState::HalfOpen => {
            record.consecutive_successes += 1;
            if record.consecutive_successes >= config.success_threshold {
                record.state = CircuitState::Closed;
                record.consecutive_failures = 0;
                record.consecutive_successes = 0;
                return Change::Transition { from: CircuitState::HalfOpen, to: CircuitState::Closed };
            }
            Change::Counters
        },
        // Another caller opened the circuit while this one was in flight.
        CircuitState::Open => Change::Unchanged,
    }
}

pub(crate) fn on_failure(record: &mut CircuitRecord, config: &CircuitConfig, now_ms: i64) -> Change {
    let previous = record.state;
    record.consecutive_failures += 1;
    record.consecutive_successes = 0;
    record.last_failure_at = Some(now_ms);

    match previous {
        CircuitState::Closed if record.consecutive_failures >= config.failure_threshold => {
            record.state = CircuitState::Open;
            Change::Transition { from: previous, to: CircuitState::Open }
        },
        CircuitState::HalfOpen => {
            record.state = CircuitState::Open;
            Change::Transition { from: previous, to: CircuitState::Open }
        },
        CircuitState::Closed | CircuitState::Open => Change::Counters,
    }
}
