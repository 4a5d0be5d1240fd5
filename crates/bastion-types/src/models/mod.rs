//! Domain models.

mod circuit;
mod command;
mod config;
mod rate_limit;
mod request;
mod saga;

pub use circuit::{CircuitConfig, CircuitRecord, CircuitSnapshot, CircuitState, CircuitStats};
pub use command::{CommandEnvelope, CommandMetadata, ForwardedRequest, ReplyEvent};
pub use config::{GatewayConfig, ReplyConfig, SagaConfig, ServiceRoute};
pub use rate_limit::{LimiterStats, RateLimitConfig, RateLimitInfo, RateLimitPolicy};
pub use request::{GatewayResponse, InboundRequest};
pub use saga::{SagaInstance, SagaStats, SagaStatus, SagaStep};
