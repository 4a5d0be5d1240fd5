use std::fmt;

/// The three call-site scopes a request can be limited under.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum RateLimitKey {
    User(String),
    UserService { user: String, service: String },
    Ip(String),
}

impl RateLimitKey {
    pub fn user(user_id: &str) -> Self {
        RateLimitKey::User(user_id.to_string())
    }

    pub fn user_service(user_id: &str, service: &str) -> Self {
        RateLimitKey::UserService { user: user_id.to_string(), service: service.to_string() }
    }

    pub fn ip(client_ip: &str) -> Self {
        RateLimitKey::Ip(client_ip.to_string())
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitKey::User(user) => write!(f, "user:{user}"),
            RateLimitKey::UserService { user, service } => write!(f, "user:{user}:service:{service}"),
            RateLimitKey::Ip(ip) => write!(f, "ip:{ip}"),
        }
    }
}
