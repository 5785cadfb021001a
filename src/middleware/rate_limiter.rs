use std::net::SocketAddr;

use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::error::DemoAccessError;
use crate::utils::net::ClientIdentity;
use crate::utils::rate_limiter::RateLimiter;

/// General API ceiling, applied to every route.
#[derive(Clone)]
pub struct ApiLimiter(pub RateLimiter);

/// Transport ceiling on demo issuance calls (route-scoped). The quota gate
/// inside the issuer is the business rule; this is abuse protection.
#[derive(Clone)]
pub struct DemoAccessLimiter(pub RateLimiter);

/// Contact form submission window (route-scoped).
#[derive(Clone)]
pub struct ContactLimiter(pub RateLimiter);

fn check(
    limiter: &RateLimiter,
    identity: ClientIdentity,
    addr: &SocketAddr,
    headers: &HeaderMap,
) -> Result<(), DemoAccessError> {
    // Keyed on the same client address the session binds to.
    let client_key = identity.ip(headers, addr);
    if limiter.check_rate_limit(&client_key) {
        Ok(())
    } else {
        Err(DemoAccessError::RateLimited)
    }
}

fn identity_of(req: &Request<axum::body::Body>) -> Result<ClientIdentity, DemoAccessError> {
    req.extensions()
        .get::<ClientIdentity>()
        .copied()
        .ok_or_else(|| DemoAccessError::Internal("client identity not installed".to_string()))
}

pub async fn api_rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, DemoAccessError> {
    let limiter = req
        .extensions()
        .get::<ApiLimiter>()
        .cloned()
        .ok_or_else(|| DemoAccessError::Internal("api rate limiter not installed".to_string()))?;

    check(&limiter.0, identity_of(&req)?, &addr, req.headers())?;
    Ok(next.run(req).await)
}

pub async fn demo_access_rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, DemoAccessError> {
    let limiter = req
        .extensions()
        .get::<DemoAccessLimiter>()
        .cloned()
        .ok_or_else(|| {
            DemoAccessError::Internal("demo access rate limiter not installed".to_string())
        })?;

    check(&limiter.0, identity_of(&req)?, &addr, req.headers())?;
    Ok(next.run(req).await)
}

pub async fn contact_rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, DemoAccessError> {
    let limiter = req
        .extensions()
        .get::<ContactLimiter>()
        .cloned()
        .ok_or_else(|| {
            DemoAccessError::Internal("contact rate limiter not installed".to_string())
        })?;

    check(&limiter.0, identity_of(&req)?, &addr, req.headers())?;
    Ok(next.run(req).await)
}
