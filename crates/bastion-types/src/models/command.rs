//! Command-channel and reply-channel payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Origin stamped on every command the gateway publishes.
pub const GATEWAY_ORIGIN: &str = "gateway";

/// The forwarded part of an inbound HTTP request, carried in command data and
/// handed to the synchronous downstream client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ForwardedRequest {
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub body: serde_json::Value,
    /// Body that is not JSON, forwarded byte for byte; `body` is null then
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<Vec<u8>>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandMetadata {
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// Message published on `{service}.commands`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    pub command_id: String,
    pub command_type: String,
    pub timestamp: DateTime<Utc>,
    pub origin_service: String,
    pub data: serde_json::Value,
    pub metadata: CommandMetadata,
}

impl CommandEnvelope {
    /// Build a command with a fresh id, stamped as originating from the gateway.
    pub fn new(
        command_type: impl Into<String>,
        data: serde_json::Value,
        metadata: CommandMetadata,
    ) -> Self {
        Self {
            command_id: Uuid::new_v4().to_string(),
            command_type: command_type.into(),
            timestamp: Utc::now(),
            origin_service: GATEWAY_ORIGIN.to_string(),
            data,
            metadata,
        }
    }

    /// Attach a correlation id and a reply destination.
    pub fn expecting_reply(mut self, correlation_id: &str, reply_to: &str) -> Self {
        self.metadata.correlation_id = Some(correlation_id.to_string());
        self.metadata.reply_to = Some(reply_to.to_string());
        self
    }
}

/// Message received on the gateway's reply topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyEvent {
    pub correlation_id: String,
    pub success: bool,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl ReplyEvent {
    pub fn ok(correlation_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self { correlation_id: correlation_id.into(), success: true, data, error: None }
    }

    pub fn failed(correlation_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            success: false,
            data: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }
}
