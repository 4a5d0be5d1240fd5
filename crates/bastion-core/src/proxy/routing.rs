use bastion_types::ServiceRoute;
use std::collections::HashMap;

/// How a request reaches its service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Direct downstream call behind the circuit breaker
    Sync,
    /// Command published to `{service}.commands`, acknowledged immediately
    Async,
}

impl DispatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchMode::Sync => "sync",
            DispatchMode::Async => "async",
        }
    }
}

/// Static prefix-to-service table plus the must-be-synchronous allow-list.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, ServiceRoute>,
    sync_prefixes: Vec<String>,
}

impl RouteTable {
    pub fn new(services: &[ServiceRoute], sync_prefixes: &[String]) -> Self {
        let routes = services
            .iter()
            .map(|route| (route.prefix.trim_matches('/').to_string(), route.clone()))
            .collect();
        let sync_prefixes =
            sync_prefixes.iter().map(|p| format!("/{}", p.trim_matches('/'))).collect();
        Self { routes, sync_prefixes }
    }

    pub fn resolve(&self, prefix: &str) -> Option<&ServiceRoute> {
        self.routes.get(prefix.trim_matches('/'))
    }

    pub fn routes(&self) -> impl Iterator<Item = &ServiceRoute> {
        self.routes.values()
    }

    /// GETs and allow-listed paths go direct; everything else is a command.
    pub fn dispatch_mode(&self, method: &str, forward_path: &str) -> DispatchMode {
        if method.eq_ignore_ascii_case("GET") || self.is_sync_path(forward_path) {
            DispatchMode::Sync
        } else {
            DispatchMode::Async
        }
    }

    /// Whole-segment prefix match: `/auth/login` covers `/auth/login/otp`
    /// but not `/auth/loginx`.
    fn is_sync_path(&self, path: &str) -> bool {
        self.sync_prefixes.iter().any(|prefix| match path.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
            None => false,
        })
    }
}
