//! Inbound requests and outbound response shapes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A request as handed to the proxy router by the HTTP layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InboundRequest {
    /// First path segment after the API root, e.g. `reservations`
    pub service_prefix: String,
    /// Remainder of the path, starting with `/` (may be empty)
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub body: serde_json::Value,
    /// Body that is not JSON, kept as received; `body` is null then
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<Vec<u8>>,
    /// Raw header map; sanitized before any dispatch
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// Authenticated principal, set by the auth layer
    #[serde(default)]
    pub principal_id: Option<String>,
    #[serde(default)]
    pub client_ip: Option<String>,
}

impl InboundRequest {
    pub fn new(
        service_prefix: impl Into<String>,
        path: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            service_prefix: service_prefix.into(),
            path: path.into(),
            method: method.into(),
            ..Default::default()
        }
    }

    /// Full forwarding path, e.g. `/auth/login`.
    pub fn forward_path(&self) -> String {
        let prefix = self.service_prefix.trim_matches('/');
        if self.path.is_empty() || self.path == "/" {
            format!("/{prefix}")
        } else if self.path.starts_with('/') {
            format!("/{prefix}{}", self.path)
        } else {
            format!("/{prefix}/{}", self.path)
        }
    }
}

/// What the gateway hands back to the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl GatewayResponse {
    /// Downstream body passed through unchanged.
    pub fn passthrough(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    /// Degraded envelope returned by the breaker fallback.
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: 503,
            body: serde_json::json!({
                "success": false,
                "message": message.into(),
                "statusCode": 503,
            }),
        }
    }

    /// Receipt for a command accepted for asynchronous processing.
    pub fn accepted(command_id: &str) -> Self {
        Self {
            status: 202,
            body: serde_json::json!({
                "success": true,
                "accepted": true,
                "status": "processing",
                "commandId": command_id,
            }),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == 503 && self.body.get("success") == Some(&serde_json::Value::Bool(false))
    }
}
