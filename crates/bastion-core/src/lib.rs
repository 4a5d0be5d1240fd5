//! # Bastion Core
//!
//! Resilience and routing core of the Bastion API gateway.
//!
//! ```text
//! bastion-core/src/
//! ├── store/            # SharedStateStore seam (in-memory, Redis)
//! ├── circuit_breaker/  # Per-dependency breaker backed by the store
//! ├── rate_limit/       # Fixed-window limiter with penalty blocks
//! ├── proxy/            # Prefix routing, sync vs async dispatch
//! ├── saga/             # Ordered steps with reverse compensation
//! ├── correlator.rs     # Request-reply over the command bus
//! ├── bus.rs            # CommandBus seam
//! ├── gateway.rs        # Per-process coordinator
//! ├── config.rs         # File + env configuration
//! └── prometheus.rs     # Prometheus recorder
//! ```
//!
//! Breaker and limiter state is shared across gateway instances through the
//! store. Sagas and pending replies live in process memory only.

#![allow(
    clippy::significant_drop_tightening,
    reason = "Lock guards are scoped to single statements and never held across awaits"
)]
#![cfg_attr(test, allow(clippy::panic, clippy::float_cmp, clippy::assertions_on_result_states))]

pub mod bus;
pub mod circuit_breaker;
pub mod config;
pub mod correlator;
pub mod gateway;
pub mod prometheus;
pub mod proxy;
pub mod rate_limit;
pub mod saga;
pub mod store;

pub use bus::{command_topic, CommandBus, InMemoryCommandBus, Publication};
pub use circuit_breaker::CircuitBreaker;
pub use config::load_config;
pub use correlator::RequestReplyCorrelator;
pub use gateway::Gateway;
pub use proxy::{DownstreamClient, HttpDownstream, ProxyRouter};
pub use rate_limit::{RateLimitKey, RateLimiter};
pub use saga::SagaOrchestrator;
pub use store::{InMemoryStore, SharedStateStore, StoreError};
#[cfg(feature = "redis")]
pub use store::RedisStore;
