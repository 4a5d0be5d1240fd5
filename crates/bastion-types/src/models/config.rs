//! Gateway configuration.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use validator::Validate;

use super::circuit::CircuitConfig;
use super::rate_limit::RateLimitPolicy;

/// Static mapping from a path prefix to the service that owns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ServiceRoute {
    #[validate(length(min = 1_u64))]
    pub prefix: String,
    /// Service name; also the breaker dependency key and command channel stem
    #[validate(length(min = 1_u64))]
    pub service: String,
    /// Base URL for synchronous calls, e.g. `http://reservations:3003`
    #[validate(length(min = 1_u64))]
    pub base_url: String,
}

impl ServiceRoute {
    pub fn new(
        prefix: impl Into<String>,
        service: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self { prefix: prefix.into(), service: service.into(), base_url: base_url.into() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct SagaConfig {
    /// Terminal sagas older than this are evicted
    #[validate(range(min = 1_u64))]
    pub retention_secs: u64,
    #[validate(range(min = 1_u64))]
    pub cleanup_interval_secs: u64,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self { retention_secs: 3600, cleanup_interval_secs: 300 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ReplyConfig {
    /// Topic this gateway consumes replies from
    #[validate(length(min = 1_u64))]
    pub reply_topic: String,
    #[validate(range(min = 1_u64))]
    pub default_timeout_ms: u64,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self { reply_topic: "gateway.replies".to_string(), default_timeout_ms: 30_000 }
    }
}

/// Full gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    #[validate(range(min = 1024_u16, max = 65535_u16))]
    pub port: u16,
    /// Timeout for synchronous downstream calls, in seconds
    #[validate(range(min = 1_u64, max = 300_u64))]
    pub request_timeout_secs: u64,
    /// Shared state store; in-memory when unset
    pub redis_url: Option<String>,
    #[validate(nested)]
    pub services: Vec<ServiceRoute>,
    /// Forwarding-path prefixes that must be dispatched synchronously
    pub sync_path_prefixes: Vec<String>,
    /// Header allow-list (lowercase); everything else is stripped
    pub forwarded_headers: Vec<String>,
    /// Peers allowed to assert `x-user-id` and `x-forwarded-for`. Requests
    /// from anyone else are keyed by their socket address only.
    pub trusted_proxies: Vec<IpAddr>,
    #[validate(nested)]
    pub circuit: CircuitConfig,
    /// TTL of persisted breaker state, in seconds
    #[validate(range(min = 1_u64))]
    pub circuit_state_ttl_secs: u64,
    #[validate(nested)]
    pub rate_limits: RateLimitPolicy,
    #[validate(nested)]
    pub saga: SagaConfig,
    #[validate(nested)]
    pub reply: ReplyConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 10,
            redis_url: None,
            services: vec![
                ServiceRoute::new("auth", "auth", "http://127.0.0.1:3001"),
                ServiceRoute::new("resources", "resources", "http://127.0.0.1:3002"),
                ServiceRoute::new("reservations", "reservations", "http://127.0.0.1:3003"),
            ],
            sync_path_prefixes: [
                "/auth/login",
                "/auth/register",
                "/auth/refresh",
                "/auth/profile",
                "/auth/me",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            forwarded_headers: [
                "authorization",
                "content-type",
                "accept",
                "x-correlation-id",
                "idempotency-key",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            trusted_proxies: Vec::new(),
            circuit: CircuitConfig::default(),
            circuit_state_ttl_secs: 86_400,
            rate_limits: RateLimitPolicy::default(),
            saga: SagaConfig::default(),
            reply: ReplyConfig::default(),
        }
    }
}
