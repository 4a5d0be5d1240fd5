//! Per-process coordinator owning every resilience component.

use crate::bus::CommandBus;
use crate::circuit_breaker::CircuitBreaker;
use crate::correlator::RequestReplyCorrelator;
use crate::proxy::{DownstreamClient, ProxyRouter};
use crate::rate_limit::RateLimiter;
use crate::saga::SagaOrchestrator;
use crate::store::SharedStateStore;
use bastion_types::{
    CircuitSnapshot, CircuitStats, GatewayConfig, GatewayError, GatewayResponse, InboundRequest,
    LimiterStats, RateLimitInfo, SagaInstance, SagaStats, SagaStep, ServiceRoute,
};
use std::sync::Arc;

/// Built once at startup; the HTTP layer and background tasks share it.
pub struct Gateway {
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateLimiter>,
    router: ProxyRouter,
    correlator: Arc<RequestReplyCorrelator>,
    sagas: Arc<SagaOrchestrator>,
}

impl Gateway {
    pub fn new(
        config: &GatewayConfig,
        store: Arc<dyn SharedStateStore>,
        bus: Arc<dyn CommandBus>,
        downstream: Arc<dyn DownstreamClient>,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::with_state_ttl(
            config.circuit,
            Arc::clone(&store),
            config.circuit_state_ttl_secs,
        ));
        let limiter =
            Arc::new(RateLimiter::with_warn_ratio(Arc::clone(&store), config.rate_limits.warn_ratio));
        let router = ProxyRouter::new(
            config,
            Arc::clone(&limiter),
            Arc::clone(&breaker),
            Arc::clone(&bus),
            downstream,
        );
        let correlator = Arc::new(RequestReplyCorrelator::new(Arc::clone(&bus), &config.reply));
        let sagas = SagaOrchestrator::with_correlator(bus, Arc::clone(&correlator), config.saga);

        Self { breaker, limiter, router, correlator, sagas }
    }

    pub async fn route(&self, request: InboundRequest) -> Result<GatewayResponse, GatewayError> {
        self.router.route(request).await
    }

    pub fn start_saga(&self, name: &str, steps: Vec<SagaStep>) -> String {
        self.sagas.start_saga(name, steps)
    }

    /// Configured prefix table.
    pub fn route_table(&self) -> impl Iterator<Item = &ServiceRoute> {
        self.router.table().routes()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn correlator(&self) -> &Arc<RequestReplyCorrelator> {
        &self.correlator
    }

    pub fn sagas(&self) -> &Arc<SagaOrchestrator> {
        &self.sagas
    }

    pub async fn reset_circuit(&self, dependency: &str) -> Result<(), GatewayError> {
        self.breaker.reset(dependency).await
    }

    pub async fn get_all_circuits(&self) -> Vec<CircuitSnapshot> {
        self.breaker.get_all().await
    }

    pub async fn get_circuit_stats(&self) -> CircuitStats {
        self.breaker.get_summary().await
    }

    pub async fn reset_limit(&self, key: &str) -> Result<(), GatewayError> {
        self.limiter.reset_limit(key).await
    }

    pub async fn get_rate_limit_info(&self, key: &str) -> Result<RateLimitInfo, GatewayError> {
        self.limiter.get_info(key).await
    }

    pub fn get_limiter_stats(&self) -> LimiterStats {
        self.limiter.stats()
    }

    pub fn get_saga_status(&self, id: &str) -> Option<SagaInstance> {
        self.sagas.get_saga_status(id)
    }

    pub fn get_active_sagas(&self) -> Vec<SagaInstance> {
        self.sagas.get_active_sagas()
    }

    pub fn get_saga_stats(&self) -> SagaStats {
        self.sagas.get_stats()
    }

    pub fn shutdown(&self) {
        self.sagas.shutdown();
    }
}
