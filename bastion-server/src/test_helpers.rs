//! Test helpers for bastion-server unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use bastion_core::{DownstreamClient, Gateway, InMemoryCommandBus, InMemoryStore};
use bastion_types::{ForwardedRequest, GatewayConfig, GatewayError, GatewayResponse, ServiceRoute};

use crate::state::AppState;

/// Downstream double: `resources` is down, paths ending in `/missing` are
/// 404s, everything else echoes the forwarded request.
pub struct EchoDownstream;

#[async_trait]
impl DownstreamClient for EchoDownstream {
    async fn call(
        &self,
        route: &ServiceRoute,
        request: &ForwardedRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        if route.service == "resources" {
            return Err(GatewayError::DependencyFailure {
                dependency: route.service.clone(),
                message: "HTTP 500".to_string(),
            });
        }
        if request.path.ends_with("/missing") {
            return Err(GatewayError::ClientError {
                status: 404,
                body: serde_json::json!({"error": "no such thing"}),
            });
        }
        Ok(GatewayResponse::passthrough(
            200,
            serde_json::json!({
                "path": request.path,
                "method": request.method,
                "body": request.body,
                "rawBody": request.raw_body,
            }),
        ))
    }
}

pub struct TestApp {
    pub state: AppState,
    pub bus: Arc<InMemoryCommandBus>,
    pub store: Arc<InMemoryStore>,
}

/// Create a minimal `AppState` for testing. Breakers open after one failure.
pub fn test_app_state() -> TestApp {
    let mut config = GatewayConfig::default();
    config.circuit.failure_threshold = 1;
    test_app_state_with(config)
}

pub fn test_app_state_with(config: GatewayConfig) -> TestApp {
    let bus = Arc::new(InMemoryCommandBus::new());
    let store = Arc::new(InMemoryStore::new());
    let gateway = Gateway::new(&config, store.clone(), bus.clone(), Arc::new(EchoDownstream));
    TestApp { state: AppState::new(gateway, config.trusted_proxies.iter().copied()), bus, store }
}
