//! Typed error definitions for Bastion.
//!
//! All errors are designed to be:
//!
//! - **Serializable** for API responses and reply channels via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** for breaker classification via enum variants
//! - **Composable** via thiserror derive macros

mod config;
mod gateway;

pub use config::ConfigError;
pub use gateway::GatewayError;

/// Standard Result type using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;
