pub mod rewrite;

use axum::body::Bytes;
use axum::http::header::{
    HeaderMap, HeaderName, ACCEPT, ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE,
    EXPIRES, LOCATION, PRAGMA, SET_COOKIE, TRANSFER_ENCODING, USER_AGENT,
};
use axum::http::{Method, StatusCode};
use axum::response::Response;

use crate::error::DemoAccessError;
use crate::models::app::App;
use crate::models::session::DemoSession;
use crate::proxy::rewrite::{host_of, origin_of, rewrite_body, rewrite_location, ContentKind};

/// Buffering reverse proxy for demo upstreams. Redirects are never followed
/// here; the Location header is rewritten back under the proxy prefix so the
/// client's next request goes through session validation again.
pub struct DemoProxy {
    client: reqwest::Client,
    user_agent: String,
}

const PROXY_ROUTE_PREFIX: &str = "/api/demo-proxy";

impl DemoProxy {
    pub fn new(user_agent: &str) -> Result<Self, DemoAccessError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| DemoAccessError::Internal(format!("proxy client: {e}")))?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }

    /// Forwards one request on behalf of a validated session and returns the
    /// sanitized, rewritten upstream response.
    pub async fn forward(
        &self,
        session: &DemoSession,
        app: &App,
        method: Method,
        rel_path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response, DemoAccessError> {
        let demo_url = app
            .demo_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(DemoAccessError::DemoUnavailable)?;

        let base = reqwest::Url::parse(demo_url)
            .map_err(|e| DemoAccessError::Internal(format!("bad demo url for {}: {e}", app.id)))?;
        let origin = origin_of(&base)
            .ok_or_else(|| DemoAccessError::Internal(format!("demo url for {} has no host", app.id)))?;
        let host = host_of(&base)
            .ok_or_else(|| DemoAccessError::Internal(format!("demo url for {} has no host", app.id)))?;

        let mut target = format!("{}/{}", demo_url.trim_end_matches('/'), rel_path.trim_start_matches('/'));
        if let Some(query) = query {
            target.push('?');
            target.push_str(query);
        }

        let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|e| DemoAccessError::Internal(format!("method: {e}")))?;

        // Only content negotiation headers cross the boundary. Cookies and
        // auth material from the client never reach the upstream, and the
        // upstream is asked for an uncompressed body so it can be rewritten.
        let mut request = self
            .client
            .request(reqwest_method, &target)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT_ENCODING, "identity")
            .header("x-forwarded-proto", "https");
        if let Some(accept) = headers.get(ACCEPT) {
            request = request.header(ACCEPT, accept);
        }
        if let Some(content_type) = headers.get(CONTENT_TYPE) {
            request = request.header(CONTENT_TYPE, content_type);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let upstream = request.send().await.map_err(|e| {
            tracing::error!("demo upstream {target} unreachable: {e}");
            DemoAccessError::UpstreamUnavailable(target.clone())
        })?;

        let status = StatusCode::from_u16(upstream.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let upstream_headers = upstream.headers().clone();
        let raw_body = upstream.bytes().await.map_err(|e| {
            tracing::error!("demo upstream {target} body read failed: {e}");
            DemoAccessError::UpstreamUnavailable(target.clone())
        })?;

        let token_prefix = format!("{PROXY_ROUTE_PREFIX}/{}", session.session_token);

        let content_type = upstream_headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let kind = ContentKind::from_content_type(content_type.as_deref());

        let body_bytes = if kind.is_rewritable() {
            match std::str::from_utf8(&raw_body) {
                Ok(text) => {
                    Bytes::from(rewrite_body(text, kind, &origin, &host, &token_prefix))
                }
                // Mislabelled binary payloads pass through untouched.
                Err(_) => raw_body,
            }
        } else {
            raw_body
        };

        let mut builder = Response::builder().status(status);
        for (name, value) in &upstream_headers {
            if is_stripped_header(name) {
                continue;
            }
            if *name == LOCATION {
                if let Ok(location) = value.to_str() {
                    builder = builder.header(
                        LOCATION,
                        rewrite_location(location, &origin, &host, &token_prefix),
                    );
                }
                continue;
            }
            builder = builder.header(name, value);
        }

        builder = builder
            .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(PRAGMA, "no-cache")
            .header(EXPIRES, "0")
            .header("x-content-type-options", "nosniff")
            .header("x-frame-options", "SAMEORIGIN")
            .header("x-robots-tag", "noindex, nofollow");

        builder
            .body(axum::body::Body::from(body_bytes))
            .map_err(|e| DemoAccessError::Internal(format!("response build: {e}")))
    }
}

/// Headers that never reach the client: upstream cookies would leak demo
/// state across visitors; length/encoding headers no longer describe the
/// rewritten body; the cache headers are replaced with our own.
fn is_stripped_header(name: &HeaderName) -> bool {
    if *name == SET_COOKIE
        || *name == CONTENT_LENGTH
        || *name == TRANSFER_ENCODING
        || *name == CACHE_CONTROL
        || *name == PRAGMA
        || *name == EXPIRES
    {
        return true;
    }
    matches!(
        name.as_str(),
        "content-encoding"
            | "connection"
            | "keep-alive"
            | "x-original-url"
            | "x-forwarded-host"
            | "x-forwarded-for"
    )
}
