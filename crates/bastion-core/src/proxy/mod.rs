//! Inbound request routing.
//!
//! Every request is resolved to its owning service, rate limited, then either
//! forwarded directly (behind the circuit breaker) or turned into a command on
//! the service's command channel.

mod downstream;
mod headers;
mod routing;


pub use downstream::{DownstreamClient, HttpDownstream};
pub use routing::{DispatchMode, RouteTable};

use crate::bus::{command_topic, CommandBus};
use crate::circuit_breaker::CircuitBreaker;
use crate::prometheus;
use crate::rate_limit::{RateLimitKey, RateLimiter};
use bastion_types::{
    CommandEnvelope, CommandMetadata, ForwardedRequest, GatewayConfig, GatewayError,
    GatewayResponse, InboundRequest, RateLimitPolicy, ServiceRoute,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

const CORRELATION_HEADER: &str = "x-correlation-id";

pub struct ProxyRouter {
    table: RouteTable,
    forwarded_headers: HashSet<String>,
    policy: RateLimitPolicy,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    bus: Arc<dyn CommandBus>,
    downstream: Arc<dyn DownstreamClient>,
}

impl ProxyRouter {
    pub fn new(
        config: &GatewayConfig,
        limiter: Arc<RateLimiter>,
        breaker: Arc<CircuitBreaker>,
        bus: Arc<dyn CommandBus>,
        downstream: Arc<dyn DownstreamClient>,
    ) -> Self {
        let table = RouteTable::new(&config.services, &config.sync_path_prefixes);
        for route in table.routes() {
            breaker.register(&route.service);
        }
        Self {
            table,
            forwarded_headers: headers::allow_list(&config.forwarded_headers),
            policy: config.rate_limits.clone(),
            limiter,
            breaker,
            bus,
            downstream,
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub async fn route(&self, request: InboundRequest) -> Result<GatewayResponse, GatewayError> {
        let route = self
            .table
            .resolve(&request.service_prefix)
            .ok_or_else(|| GatewayError::NotFound { prefix: request.service_prefix.clone() })?;

        self.apply_rate_limits(&request, &route.service).await?;

        let forwarded = ForwardedRequest {
            path: request.forward_path(),
            method: request.method.to_ascii_uppercase(),
            body: request.body,
            raw_body: request.raw_body,
            query: request.query,
            headers: headers::sanitize(&request.headers, &self.forwarded_headers),
        };

        match self.table.dispatch_mode(&forwarded.method, &forwarded.path) {
            DispatchMode::Sync => {
                prometheus::record_dispatch(&route.service, DispatchMode::Sync.as_str());
                self.call_sync(route, &forwarded).await
            },
            DispatchMode::Async => match self.publish_command(route, &forwarded).await {
                Ok(response) => {
                    prometheus::record_dispatch(&route.service, DispatchMode::Async.as_str());
                    Ok(response)
                },
                Err(e) => {
                    warn!(
                        service = %route.service,
                        path = %forwarded.path,
                        error = %e,
                        "Command publish failed, falling back to direct call"
                    );
                    prometheus::record_dispatch(&route.service, "async_fallback");
                    self.call_sync(route, &forwarded).await
                },
            },
        }
    }

    /// Principal-scoped limits (global plus per service) when authenticated,
    /// otherwise the client IP limit. Every applicable key must pass.
    async fn apply_rate_limits(
        &self,
        request: &InboundRequest,
        service: &str,
    ) -> Result<(), GatewayError> {
        if let Some(user) = request.principal_id.as_deref() {
            let global = RateLimitKey::user(user).to_string();
            self.limiter.check_limit(&global, &self.policy.user).await?;
            let scoped = RateLimitKey::user_service(user, service).to_string();
            self.limiter.check_limit(&scoped, &self.policy.user_service).await?;
        } else if let Some(ip) = request.client_ip.as_deref() {
            let key = RateLimitKey::ip(ip).to_string();
            self.limiter.check_limit(&key, &self.policy.ip).await?;
        } else {
            debug!(service = %service, "Request has neither principal nor client IP, not rate limited");
        }
        Ok(())
    }

    async fn call_sync(
        &self,
        route: &ServiceRoute,
        forwarded: &ForwardedRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let service = route.service.as_str();
        self.breaker
            .execute_with_fallback(
                service,
                || self.downstream.call(route, forwarded),
                |_| GatewayResponse::degraded(format!("{service} service is temporarily unavailable")),
            )
            .await
    }

    async fn publish_command(
        &self,
        route: &ServiceRoute,
        forwarded: &ForwardedRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let data = serde_json::to_value(forwarded)
            .map_err(|e| GatewayError::Internal { message: e.to_string() })?;
        let command = CommandEnvelope::new(
            format!("{}.{}", route.service, forwarded.method),
            data,
            CommandMetadata {
                aggregate_id: forwarded.path.clone(),
                aggregate_type: route.service.clone(),
                version: 1,
                correlation_id: forwarded.headers.get(CORRELATION_HEADER).cloned(),
                reply_to: None,
            },
        );

        let topic = command_topic(&route.service);
        self.bus.publish(&topic, &command).await?;
        debug!(
            topic = %topic,
            command_id = %command.command_id,
            command_type = %command.command_type,
            "Command published"
        );
        Ok(GatewayResponse::accepted(&command.command_id))
    }
}
