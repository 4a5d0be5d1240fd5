//! Application State
//!
//! Holds the gateway coordinator shared by every handler.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use bastion_core::Gateway;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub gateway: Gateway,
    pub trusted_proxies: HashSet<IpAddr>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(gateway: Gateway, trusted_proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                gateway,
                trusted_proxies: trusted_proxies.into_iter().collect(),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.inner.gateway
    }

    /// Whether `peer` may speak for the client via forwarding headers.
    pub fn is_trusted_proxy(&self, peer: IpAddr) -> bool {
        self.inner.trusted_proxies.contains(&peer)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }
}
