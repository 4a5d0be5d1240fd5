//! Saga models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One step of a distributed operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SagaStep {
    /// Service whose command channel receives the step
    pub target_service: String,
    /// Command type published for the step
    pub action: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Command type published to undo the step
    #[serde(default)]
    pub compensation_action: Option<String>,
    #[serde(default)]
    pub compensation_payload: Option<serde_json::Value>,
    /// When set, the step waits this many milliseconds for a reply instead of
    /// firing and forgetting
    #[serde(default)]
    pub await_reply_ms: Option<u64>,
}

impl SagaStep {
    pub fn new(
        target_service: impl Into<String>,
        action: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            target_service: target_service.into(),
            action: action.into(),
            payload,
            compensation_action: None,
            compensation_payload: None,
            await_reply_ms: None,
        }
    }

    pub fn with_compensation(
        mut self,
        action: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        self.compensation_action = Some(action.into());
        self.compensation_payload = Some(payload);
        self
    }

    pub fn awaiting_reply(mut self, timeout_ms: u64) -> Self {
        self.await_reply_ms = Some(timeout_ms);
        self
    }
}

/// Saga lifecycle: Pending → InProgress → {Completed | Failed → Compensating → Compensated}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Compensating,
    Compensated,
}

impl SagaStatus {
    /// Terminal sagas are eligible for the cleanup sweep.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Compensated)
    }
}

/// A running or finished saga.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SagaInstance {
    pub id: String,
    pub name: String,
    pub steps: Vec<SagaStep>,
    pub current_step: usize,
    pub status: SagaStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Stack of step indices dispatched without error, ascending. Compensation
    /// pops from the top.
    pub completed_steps: Vec<usize>,
    /// Step indices in the order compensation was attempted
    pub compensated_steps: Vec<usize>,
    pub compensation_errors: Vec<String>,
}

impl SagaInstance {
    pub fn new(id: String, name: String, steps: Vec<SagaStep>) -> Self {
        Self {
            id,
            name,
            steps,
            current_step: 0,
            status: SagaStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
            error: None,
            completed_steps: Vec::new(),
            compensated_steps: Vec::new(),
            compensation_errors: Vec::new(),
        }
    }
}

/// Saga counts by status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SagaStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub compensating: usize,
    pub compensated: usize,
}
