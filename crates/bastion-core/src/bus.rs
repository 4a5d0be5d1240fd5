//! Command bus seam.
//!
//! The transport itself (broker, topics, consumer groups) lives outside the
//! gateway. The router, the saga orchestrator and the correlator only need to
//! hand a [`CommandEnvelope`] to a topic.

use async_trait::async_trait;
use bastion_types::{CommandEnvelope, GatewayError};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use tokio::sync::broadcast;

/// Topic carrying asynchronous commands for `service`.
pub fn command_topic(service: &str) -> String {
    format!("{service}.commands")
}

#[async_trait]
pub trait CommandBus: Send + Sync {
    /// Hand `command` to the transport. Success means the transport accepted
    /// it, not that any consumer processed it.
    async fn publish(&self, topic: &str, command: &CommandEnvelope) -> Result<(), GatewayError>;
}

/// A published command as seen by subscribers of [`InMemoryCommandBus`].
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub topic: String,
    pub command: CommandEnvelope,
}

/// Publications kept by [`InMemoryCommandBus::new`].
pub const DEFAULT_HISTORY: usize = 1024;

/// Process-local bus for single-instance deployments and tests.
///
/// Every publication is broadcast to subscribers, and the most recent ones are
/// kept for inspection up to the history capacity. Topics or command types can
/// be marked as failing to simulate a broken transport.
pub struct InMemoryCommandBus {
    published: Mutex<VecDeque<Publication>>,
    history: usize,
    failing_topics: Mutex<HashSet<String>>,
    failing_commands: Mutex<HashSet<String>>,
    sender: broadcast::Sender<Publication>,
}

impl Default for InMemoryCommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCommandBus {
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Keep at most `history` publications; zero keeps none.
    pub fn with_history(history: usize) -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            published: Mutex::new(VecDeque::with_capacity(history.min(DEFAULT_HISTORY))),
            history,
            failing_topics: Mutex::new(HashSet::new()),
            failing_commands: Mutex::new(HashSet::new()),
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Publication> {
        self.sender.subscribe()
    }

    /// Retained publications, oldest first.
    pub fn published(&self) -> Vec<Publication> {
        self.published.lock().iter().cloned().collect()
    }

    /// Command types published so far, in order.
    pub fn published_types(&self) -> Vec<String> {
        self.published.lock().iter().map(|p| p.command.command_type.clone()).collect()
    }

    pub fn fail_topic(&self, topic: &str) {
        self.failing_topics.lock().insert(topic.to_string());
    }

    pub fn fail_command_type(&self, command_type: &str) {
        self.failing_commands.lock().insert(command_type.to_string());
    }

    pub fn heal(&self) {
        self.failing_topics.lock().clear();
        self.failing_commands.lock().clear();
    }
}

#[async_trait]
impl CommandBus for InMemoryCommandBus {
    async fn publish(&self, topic: &str, command: &CommandEnvelope) -> Result<(), GatewayError> {
        if self.failing_topics.lock().contains(topic)
            || self.failing_commands.lock().contains(&command.command_type)
        {
            return Err(GatewayError::PublishFailure {
                topic: topic.to_string(),
                message: format!("transport rejected {}", command.command_type),
            });
        }

        let publication = Publication { topic: topic.to_string(), command: command.clone() };
        if self.history > 0 {
            let mut published = self.published.lock();
            if published.len() == self.history {
                published.pop_front();
            }
            published.push_back(publication.clone());
        }
        // No subscribers is fine.
        let _ = self.sender.send(publication);
        Ok(())
    }
}
