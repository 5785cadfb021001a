use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::app::AppSummary;
use crate::storage::StorageError;

/// Errors surfaced by the demo-access subsystem and its HTTP boundary.
///
/// Quota, expiry and binding failures are expected business outcomes and
/// carry the app summary the client needs to present a purchase path;
/// they are not system errors.
#[derive(Debug, Error)]
pub enum DemoAccessError {
    #[error("app not found")]
    AppNotFound,

    #[error("demo session not found")]
    SessionNotFound,

    #[error("app has no demo deployment")]
    DemoUnavailable,

    /// Daily issuance cap reached for this IP+app pair.
    #[error("daily demo quota reached")]
    QuotaExceeded { app: AppSummary },

    /// Concurrent-active cap reached for this IP+app pair.
    #[error("concurrent demo limit reached")]
    ConcurrencyExceeded { app: AppSummary },

    /// Normal terminal state of a session; still carries the app so the
    /// client can show the purchase upsell.
    #[error("demo session expired")]
    SessionExpired { app: Option<AppSummary> },

    #[error("session ip mismatch")]
    IpMismatch,

    #[error("session user-agent mismatch")]
    UaMismatch,

    #[error("upstream demo unreachable: {0}")]
    UpstreamUnavailable(String),

    #[error("too many requests")]
    RateLimited,

    #[error("payment system not configured")]
    PaymentsNotConfigured,

    #[error("payment provider error: {0}")]
    Payment(String),

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("{0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DemoAccessError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AppNotFound | Self::SessionNotFound => StatusCode::NOT_FOUND,
            Self::DemoUnavailable | Self::InvalidSignature | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::QuotaExceeded { .. } | Self::ConcurrencyExceeded { .. } | Self::RateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::SessionExpired { .. } => StatusCode::GONE,
            Self::IpMismatch | Self::UaMismatch => StatusCode::FORBIDDEN,
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::PaymentsNotConfigured | Self::Payment(_) | Self::Internal(_) | Self::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for DemoAccessError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::AppNotFound => json!({ "message": "App not found" }),
            Self::SessionNotFound => json!({ "message": "Demo session not found" }),
            Self::DemoUnavailable => {
                json!({ "message": "This app does not have a demo available" })
            }
            Self::QuotaExceeded { app } => json!({
                "message": "Daily demo limit reached for this app",
                "requiresPurchase": true,
                "app": app,
            }),
            Self::ConcurrencyExceeded { app } => json!({
                "message": "Too many active demo sessions for this app",
                "requiresPurchase": true,
                "app": app,
            }),
            Self::SessionExpired { app } => json!({
                "message": "Demo session expired",
                "expired": true,
                "requiresPurchase": true,
                "app": app,
            }),
            Self::IpMismatch => json!({
                "message": "IP address mismatch - session cannot be shared",
                "securityViolation": true,
            }),
            Self::UaMismatch => json!({
                "message": "Session security violation - please request a new demo",
                "securityViolation": true,
                "requiresPurchase": true,
            }),
            Self::UpstreamUnavailable(_) => json!({
                "message": "Demo temporarily unavailable, please try again shortly",
                "retryable": true,
            }),
            Self::RateLimited => {
                json!({ "message": "Too many requests, please try again later" })
            }
            Self::PaymentsNotConfigured => {
                json!({ "message": "Payment system not configured. Please contact support." })
            }
            Self::Payment(detail) => {
                json!({ "message": format!("Error creating payment intent: {detail}") })
            }
            Self::InvalidSignature => json!({ "message": "Webhook signature verification failed" }),
            Self::Validation(message) => json!({ "message": message }),
            Self::Internal(_) => json!({ "message": "Internal server error" }),
            // Storage details stay in the logs, not on the wire.
            Self::Storage(_) => json!({ "message": "Internal server error" }),
        };

        if let Self::Storage(err) = &self {
            tracing::error!("storage failure surfaced at http boundary: {err}");
        }

        (status, Json(body)).into_response()
    }
}
