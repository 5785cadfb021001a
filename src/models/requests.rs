use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub message: String,
    // Honeypot fields; bots fill these, browsers never render them.
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl ContactForm {
    pub fn tripped_honeypot(&self) -> bool {
        self.website.as_deref().is_some_and(|s| !s.is_empty())
            || self.url.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    pub app_id: String,
    pub customer_email: String,
    #[serde(default)]
    pub customer_name: Option<String>,
}
