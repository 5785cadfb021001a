use std::net::SocketAddr;

use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;

/// Resolves the client address used for session binding and rate limiting.
///
/// Behind the trusted reverse proxy the proxy appends the real client
/// address as the *last* `X-Forwarded-For` entry; everything before it is
/// client-supplied and must not be believed. Without a trusted proxy the
/// header is entirely attacker-controlled, so only the socket peer counts.
#[derive(Debug, Clone, Copy)]
pub struct ClientIdentity {
    trust_proxy: bool,
}

impl ClientIdentity {
    pub fn new(trust_proxy: bool) -> Self {
        Self { trust_proxy }
    }

    pub fn ip(&self, headers: &HeaderMap, addr: &SocketAddr) -> String {
        if self.trust_proxy {
            if let Some(entry) = headers
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next_back())
                .map(str::trim)
                .filter(|value| !value.is_empty())
            {
                return entry.to_string();
            }
        }
        addr.ip().to_string()
    }
}

pub fn client_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .filter(|value| !value.is_empty())
}
