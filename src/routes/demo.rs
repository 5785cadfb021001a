use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, RawQuery, State},
    http::{HeaderMap, Method},
    response::Response,
    Json,
};

use crate::api::AppContext;
use crate::error::DemoAccessError;
use crate::models::responses::DemoAccessGranted;
use crate::utils::net::client_user_agent;

#[utoipa::path(
    post,
    path = "/api/demo-access/{app_id}",
    tag = "Demo",
    params(
        ("app_id" = String, Path, description = "App to open a demo for")
    ),
    responses(
        (status = 200, description = "Demo session issued", body = DemoAccessGranted),
        (status = 404, description = "No such app"),
        (status = 400, description = "App has no demo deployment"),
        (status = 429, description = "Daily or concurrent demo limit reached"),
    )
)]
pub async fn request_demo_access(
    State(context): State<AppContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(app_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DemoAccessGranted>, DemoAccessError> {
    let ip = context.identity.ip(&headers, &addr);
    let user_agent = client_user_agent(&headers);

    let granted = context
        .issuer
        .issue(&app_id, &ip, user_agent.as_deref())
        .await?;

    Ok(Json(granted))
}

/// `/{token}` with no trailing path proxies the upstream root.
pub async fn proxy_demo_root(
    State(context): State<AppContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(token): Path<String>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, DemoAccessError> {
    proxy(context, addr, token, String::new(), method, query, headers, body).await
}

pub async fn proxy_demo(
    State(context): State<AppContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path((token, rel_path)): Path<(String, String)>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, DemoAccessError> {
    proxy(context, addr, token, rel_path, method, query, headers, body).await
}

/// Every proxied request re-validates the token; nothing is forwarded for
/// a session that fails any check.
#[allow(clippy::too_many_arguments)]
async fn proxy(
    context: AppContext,
    addr: SocketAddr,
    token: String,
    rel_path: String,
    method: Method,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, DemoAccessError> {
    let ip = context.identity.ip(&headers, &addr);
    let user_agent = client_user_agent(&headers);

    let (session, app) = context
        .validator
        .validate(&token, Some(&ip), user_agent.as_deref())
        .await?;

    context
        .proxy
        .forward(
            &session,
            &app,
            method,
            &rel_path,
            query.as_deref(),
            &headers,
            body,
        )
        .await
}
