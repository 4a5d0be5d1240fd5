//! Saga orchestration with reverse-order compensation.
//!
//! A saga is an ordered list of steps, each published as a command to the
//! step's target service. Steps run strictly one after another in a detached
//! task. When a step cannot be dispatched the saga fails and every step that
//! was dispatched gets its compensation published, newest first.
//!
//! Saga state lives only in this process. It is not shared with other gateway
//! instances and does not survive a restart.

#[cfg(test)]
mod tests;

pub use bastion_types::{SagaConfig, SagaInstance, SagaStats, SagaStatus, SagaStep};

use crate::bus::{command_topic, CommandBus};
use crate::correlator::RequestReplyCorrelator;
use crate::prometheus;
use bastion_types::{CommandEnvelope, CommandMetadata, GatewayError};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct SagaOrchestrator {
    sagas: RwLock<HashMap<String, SagaInstance>>,
    bus: Arc<dyn CommandBus>,
    correlator: Option<Arc<RequestReplyCorrelator>>,
    config: SagaConfig,
    /// Shutdown signal for the cleanup task
    shutdown_tx: tokio::sync::watch::Sender<bool>,
}

impl SagaOrchestrator {
    pub fn new(bus: Arc<dyn CommandBus>, config: SagaConfig) -> Arc<Self> {
        Self::build(bus, None, config)
    }

    /// Orchestrator whose `await_reply_ms` steps wait for replies through `correlator`.
    pub fn with_correlator(
        bus: Arc<dyn CommandBus>,
        correlator: Arc<RequestReplyCorrelator>,
        config: SagaConfig,
    ) -> Arc<Self> {
        Self::build(bus, Some(correlator), config)
    }

    fn build(
        bus: Arc<dyn CommandBus>,
        correlator: Option<Arc<RequestReplyCorrelator>>,
        config: SagaConfig,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);
        Arc::new(Self { sagas: RwLock::new(HashMap::new()), bus, correlator, config, shutdown_tx })
    }

    /// Register a saga and run it in the background. Returns its id at once.
    pub fn start_saga(self: &Arc<Self>, name: &str, steps: Vec<SagaStep>) -> String {
        let id = Uuid::new_v4().to_string();
        let instance = SagaInstance::new(id.clone(), name.to_string(), steps);
        self.sagas.write().insert(id.clone(), instance);
        info!(saga_id = %id, saga = %name, "Saga started");

        let orchestrator = Arc::clone(self);
        let saga_id = id.clone();
        tokio::spawn(async move {
            orchestrator.run(&saga_id).await;
        });
        id
    }

    async fn run(&self, id: &str) {
        let Some((name, steps)) = self.update(id, |saga| {
            saga.status = SagaStatus::InProgress;
            (saga.name.clone(), saga.steps.clone())
        }) else {
            return;
        };

        for (index, step) in steps.iter().enumerate() {
            self.update(id, |saga| saga.current_step = index);

            match self.dispatch_step(id, &name, index, step).await {
                Ok(()) => {
                    self.update(id, |saga| saga.completed_steps.push(index));
                    debug!(saga_id = %id, step = index, action = %step.action, "Saga step dispatched");
                },
                Err(e) => {
                    warn!(
                        saga_id = %id,
                        step = index,
                        action = %step.action,
                        error = %e,
                        "Saga step failed"
                    );
                    self.update(id, |saga| {
                        saga.status = SagaStatus::Failed;
                        saga.error = Some(format!("step {index} ({}): {e}", step.action));
                    });
                    self.compensate(id, &name).await;
                    return;
                },
            }
        }

        self.update(id, |saga| {
            saga.status = SagaStatus::Completed;
            saga.ended_at = Some(Utc::now());
        });
        prometheus::record_saga_finished("completed");
        info!(saga_id = %id, saga = %name, "Saga completed");
    }

    async fn dispatch_step(
        &self,
        id: &str,
        name: &str,
        index: usize,
        step: &SagaStep,
    ) -> Result<(), GatewayError> {
        let topic = command_topic(&step.target_service);
        let command = saga_command(id, name, index, &step.action, step.payload.clone());

        match (step.await_reply_ms, &self.correlator) {
            (Some(timeout_ms), Some(correlator)) => {
                correlator.send_and_wait_reply(&topic, command, Some(timeout_ms)).await?;
                Ok(())
            },
            (Some(_), None) => {
                debug!(saga_id = %id, step = index, "No correlator attached, not waiting for reply");
                self.bus.publish(&topic, &command).await
            },
            (None, _) => self.bus.publish(&topic, &command).await,
        }
    }

    /// Pop dispatched steps off the stack and publish their compensations.
    /// A failed compensation is recorded and the sweep moves on.
    async fn compensate(&self, id: &str, name: &str) {
        self.update(id, |saga| saga.status = SagaStatus::Compensating);
        info!(saga_id = %id, saga = %name, "Saga compensating");

        loop {
            let Some(Some((index, step))) = self.update(id, |saga| {
                let index = saga.completed_steps.pop()?;
                saga.steps.get(index).cloned().map(|step| (index, step))
            }) else {
                break;
            };

            let Some(action) = step.compensation_action.as_deref() else {
                debug!(saga_id = %id, step = index, "Step has no compensation");
                continue;
            };

            let topic = command_topic(&step.target_service);
            let payload = step.compensation_payload.clone().unwrap_or(serde_json::Value::Null);
            let command = saga_command(id, name, index, action, payload);
            let outcome = self.bus.publish(&topic, &command).await;

            self.update(id, |saga| {
                saga.compensated_steps.push(index);
                if let Err(e) = &outcome {
                    saga.compensation_errors.push(format!("step {index} ({action}): {e}"));
                }
            });
            match outcome {
                Ok(()) => debug!(saga_id = %id, step = index, action = %action, "Compensation dispatched"),
                Err(e) => error!(
                    saga_id = %id,
                    step = index,
                    action = %action,
                    error = %e,
                    "Compensation failed"
                ),
            }
        }

        self.update(id, |saga| {
            saga.status = SagaStatus::Compensated;
            saga.ended_at = Some(Utc::now());
        });
        prometheus::record_saga_finished("compensated");
        info!(saga_id = %id, saga = %name, "Saga compensated");
    }

    fn update<R>(&self, id: &str, f: impl FnOnce(&mut SagaInstance) -> R) -> Option<R> {
        self.sagas.write().get_mut(id).map(f)
    }

    pub fn get_saga_status(&self, id: &str) -> Option<SagaInstance> {
        self.sagas.read().get(id).cloned()
    }

    /// Sagas that have not reached a terminal status, oldest first.
    pub fn get_active_sagas(&self) -> Vec<SagaInstance> {
        let mut active: Vec<SagaInstance> =
            self.sagas.read().values().filter(|s| !s.status.is_terminal()).cloned().collect();
        active.sort_by_key(|s| s.started_at);
        active
    }

    pub fn get_stats(&self) -> SagaStats {
        let sagas = self.sagas.read();
        let mut stats = SagaStats { total: sagas.len(), ..SagaStats::default() };
        for saga in sagas.values() {
            match saga.status {
                SagaStatus::Pending => stats.pending += 1,
                SagaStatus::InProgress => stats.in_progress += 1,
                SagaStatus::Completed => stats.completed += 1,
                SagaStatus::Failed => stats.failed += 1,
                SagaStatus::Compensating => stats.compensating += 1,
                SagaStatus::Compensated => stats.compensated += 1,
            }
        }
        stats
    }

    /// Evict terminal sagas that ended before the retention window.
    pub fn cleanup_expired(&self) -> usize {
        let retention = i64::try_from(self.config.retention_secs).unwrap_or(i64::MAX);
        match chrono::Duration::try_seconds(retention).and_then(|d| Utc::now().checked_sub_signed(d)) {
            Some(cutoff) => self.evict_ended_before(cutoff),
            None => 0,
        }
    }

    fn evict_ended_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sagas = self.sagas.write();
        let before = sagas.len();
        sagas.retain(|_, saga| {
            !(saga.status.is_terminal() && saga.ended_at.unwrap_or(saga.started_at) < cutoff)
        });
        let removed = before - sagas.len();
        if removed > 0 {
            info!(removed, remaining = sagas.len(), "Evicted expired sagas");
        }
        removed
    }

    /// Start the periodic cleanup sweep. The task only holds a weak handle, so
    /// it ends on [`shutdown`](Self::shutdown) or when the orchestrator is dropped.
    pub fn start_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let orchestrator = Arc::downgrade(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = Duration::from_secs(self.config.cleanup_interval_secs);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(interval) => {
                        let Some(orchestrator) = orchestrator.upgrade() else {
                            break;
                        };
                        orchestrator.cleanup_expired();
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Saga cleanup task shutting down");
                        break;
                    }
                }
            }
        })
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for SagaOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn saga_command(
    saga_id: &str,
    saga_name: &str,
    index: usize,
    action: &str,
    payload: serde_json::Value,
) -> CommandEnvelope {
    CommandEnvelope::new(
        action,
        payload,
        CommandMetadata {
            aggregate_id: saga_id.to_string(),
            aggregate_type: saga_name.to_string(),
            version: u32::try_from(index + 1).unwrap_or(u32::MAX),
            correlation_id: Some(saga_id.to_string()),
            reply_to: None,
        },
    )
}
