//! # Bastion Types
//!
//! Data model and error definitions for the Bastion gateway core.
//!
//! - **`error`** - Typed error taxonomy (client errors, dependency failures,
//!   short-circuits, rate limits, publish failures, reply timeouts)
//! - **`models`** - Circuit, rate-limit, saga, command and request models plus
//!   the gateway configuration
//!
//! ## Architecture Role
//!
//! `bastion-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!          bastion-types (this crate)
//!                  │
//!                  ▼
//!            bastion-core
//!                  │
//!                  ▼
//!           bastion-server
//! ```
//!
//! Everything here is serializable so the same shapes travel through the
//! shared state store, the command bus, and the administrative API.

pub mod error;
pub mod models;

pub use error::{ConfigError, GatewayError, Result};

pub use models::{
    CircuitConfig, CircuitRecord, CircuitSnapshot, CircuitState, CircuitStats, CommandEnvelope,
    CommandMetadata, ForwardedRequest, GatewayConfig, GatewayResponse, InboundRequest,
    LimiterStats, RateLimitConfig, RateLimitInfo, RateLimitPolicy, ReplyConfig, ReplyEvent,
    SagaConfig, SagaInstance, SagaStats, SagaStatus, SagaStep, ServiceRoute,
};
