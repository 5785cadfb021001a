use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Successful issuance payload for `POST /api/demo-access/{app_id}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DemoAccessGranted {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub duration_minutes: i64,
}
