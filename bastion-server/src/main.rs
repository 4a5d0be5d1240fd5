//! Bastion Server - Headless Gateway Daemon
//!
//! A pure Rust HTTP server that:
//! - Proxies `/api/{service}/*` to backend services, either directly behind a
//!   circuit breaker or as commands on the service's command channel
//! - Rate limits every proxied request per principal, per service and per IP
//! - Exposes breaker, limiter and saga state on `/admin/*`
//! - Serves Prometheus metrics on `/metrics`

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod router;
mod server_utils;
mod state;
#[cfg(test)]
mod test_helpers;

use bastion_core::{
    load_config, Gateway, HttpDownstream, InMemoryCommandBus, InMemoryStore, SharedStateStore,
};
use bastion_types::GatewayConfig;
use cli::Cli;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    info!("🚀 Bastion gateway starting on port {}...", config.port);

    bastion_core::prometheus::init_metrics()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    let store = build_store(&config).await?;
    let bus = Arc::new(InMemoryCommandBus::with_history(0));
    let downstream =
        Arc::new(HttpDownstream::new(Duration::from_secs(config.request_timeout_secs))?);

    let gateway = Gateway::new(&config, store, bus.clone(), downstream);
    let _cleanup = gateway.sagas().start_cleanup_task();
    let _replies = server_utils::spawn_reply_bridge(&bus, gateway.correlator());

    for route in gateway.route_table() {
        info!("🔀 /api/{} -> {} ({})", route.prefix, route.service, route.base_url);
    }

    if !config.trusted_proxies.is_empty() {
        info!("🔐 Trusting forwarding headers from {:?}", config.trusted_proxies);
    }

    let state = AppState::new(gateway, config.trusted_proxies.iter().copied());
    let app = router::build_router(state.clone());

    let ip: std::net::IpAddr = config
        .host
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", config.host, e))?;
    let addr = SocketAddr::new(ip, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🌐 Server listening on http://{}", addr);
    info!("🛡️ Admin API at http://{}/admin/", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(server_utils::shutdown_signal())
        .await?;

    state.gateway().shutdown();
    info!("👋 Bastion gateway stopped");
    Ok(())
}

async fn build_store(config: &GatewayConfig) -> Result<Arc<dyn SharedStateStore>> {
    match config.redis_url.as_deref() {
        #[cfg(feature = "redis")]
        Some(url) => {
            let store = bastion_core::RedisStore::connect(url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to Redis: {}", e))?;
            info!("📦 Shared state in Redis");
            Ok(Arc::new(store))
        },
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            tracing::warn!("⚠️ redis_url set but built without the `redis` feature, using in-memory state");
            Ok(Arc::new(InMemoryStore::new()))
        },
        None => {
            info!("📦 Shared state in process memory (single instance)");
            Ok(Arc::new(InMemoryStore::new()))
        },
    }
}
