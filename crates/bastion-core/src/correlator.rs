//! Request-reply correlation over the command bus.
//!
//! A caller publishes a command tagged with a fresh correlation id and the
//! gateway's reply topic, then waits on a oneshot channel. Replies arriving on
//! that topic are fed to [`RequestReplyCorrelator::handle_reply`]. Each pending
//! entry settles exactly once: whoever removes it from the map (reply or
//! deadline) decides the outcome.

use crate::bus::CommandBus;
use crate::prometheus;
use bastion_types::{CommandEnvelope, GatewayError, ReplyConfig, ReplyEvent};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

type Settlement = Result<Value, GatewayError>;

pub struct RequestReplyCorrelator {
    bus: Arc<dyn CommandBus>,
    pending: DashMap<String, oneshot::Sender<Settlement>>,
    reply_topic: String,
    default_timeout: Duration,
}

/// Removes the pending entry if the waiting future is dropped early.
struct PendingGuard<'a> {
    pending: &'a DashMap<String, oneshot::Sender<Settlement>>,
    correlation_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.correlation_id);
        prometheus::set_pending_replies(self.pending.len());
    }
}

impl RequestReplyCorrelator {
    pub fn new(bus: Arc<dyn CommandBus>, config: &ReplyConfig) -> Self {
        Self {
            bus,
            pending: DashMap::new(),
            reply_topic: config.reply_topic.clone(),
            default_timeout: Duration::from_millis(config.default_timeout_ms),
        }
    }

    pub fn reply_topic(&self) -> &str {
        &self.reply_topic
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Publish `command` to `topic` and wait for its reply.
    ///
    /// Resolves with the reply's data, or fails with
    /// [`GatewayError::ReplyRejected`], [`GatewayError::ReplyTimeout`] or the
    /// publish error. A timeout only abandons the wait; whatever the command
    /// started downstream keeps running.
    pub async fn send_and_wait_reply(
        &self,
        topic: &str,
        command: CommandEnvelope,
        timeout_ms: Option<u64>,
    ) -> Result<Value, GatewayError> {
        let timeout = timeout_ms.map_or(self.default_timeout, Duration::from_millis);
        let correlation_id = Uuid::new_v4().to_string();
        let command = command.expecting_reply(&correlation_id, &self.reply_topic);

        let (tx, mut rx) = oneshot::channel();
        self.pending.insert(correlation_id.clone(), tx);
        prometheus::set_pending_replies(self.pending.len());
        let _guard = PendingGuard { pending: &self.pending, correlation_id: &correlation_id };

        debug!(
            correlation_id = %correlation_id,
            topic = %topic,
            command_type = %command.command_type,
            "Awaiting reply"
        );
        self.bus.publish(topic, &command).await?;

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(settlement)) => settlement,
            Ok(Err(_)) => Err(GatewayError::Internal {
                message: format!("reply channel for {correlation_id} closed"),
            }),
            Err(_) => {
                if self.pending.remove(&correlation_id).is_some() {
                    prometheus::record_reply_timeout();
                    warn!(
                        correlation_id = %correlation_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "Reply timed out"
                    );
                    return Err(GatewayError::ReplyTimeout {
                        correlation_id: correlation_id.clone(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                // A reply claimed the entry between the deadline and the removal.
                rx.await.unwrap_or_else(|_| {
                    Err(GatewayError::Internal {
                        message: format!("reply channel for {correlation_id} closed"),
                    })
                })
            },
        }
    }

    /// Settle the pending request matching `reply`. Returns false when nothing
    /// was waiting (unknown id, already timed out, or a duplicate).
    pub fn handle_reply(&self, reply: ReplyEvent) -> bool {
        let Some((correlation_id, tx)) = self.pending.remove(&reply.correlation_id) else {
            debug!(correlation_id = %reply.correlation_id, "Dropping reply with no pending request");
            return false;
        };
        prometheus::set_pending_replies(self.pending.len());

        let settlement = if reply.success {
            Ok(reply.data)
        } else {
            Err(GatewayError::ReplyRejected {
                correlation_id: correlation_id.clone(),
                message: reply.error.unwrap_or_else(|| "command failed".to_string()),
            })
        };
        if tx.send(settlement).is_err() {
            debug!(correlation_id = %correlation_id, "Waiter gone before reply arrived");
        }
        true
    }

    /// Feed replies from the transport into [`handle_reply`](Self::handle_reply)
    /// until the channel closes.
    pub fn spawn_reply_listener(
        self: &Arc<Self>,
        mut replies: mpsc::Receiver<ReplyEvent>,
    ) -> JoinHandle<()> {
        let correlator = Arc::clone(self);
        tokio::spawn(async move {
            info!(topic = %correlator.reply_topic, "Reply listener started");
            while let Some(reply) = replies.recv().await {
                correlator.handle_reply(reply);
            }
            info!("Reply listener stopped");
        })
    }
}
