use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Catalog entry for a portfolio app. Read-only to the demo subsystem;
/// catalog management owns the write side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: String,
    pub name: String,
    pub description: String,
    pub long_description: Option<String>,
    /// Decimal amount as a string, e.g. "49.99". `None` means not for sale.
    pub price: Option<String>,
    pub category: String,
    pub image_url: Option<String>,
    /// Upstream demo deployment. `None` means demos are unsupported.
    pub demo_url: Option<String>,
    pub github_url: Option<String>,
    pub technologies: Vec<String>,
    pub features: Vec<String>,
    pub is_premium: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl App {
    pub fn summary(&self) -> AppSummary {
        AppSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            price: self.price.clone(),
        }
    }
}

/// The slice of an app sent with quota/expiry responses so the client can
/// present a purchase path.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppSummary {
    pub id: String,
    pub name: String,
    pub price: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApp {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub demo_url: Option<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub is_premium: bool,
}

impl NewApp {
    pub fn into_app(self) -> App {
        let now = Utc::now();
        App {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            description: self.description,
            long_description: self.long_description,
            price: self.price,
            category: self.category,
            image_url: self.image_url,
            demo_url: self.demo_url,
            github_url: self.github_url,
            technologies: self.technologies,
            features: self.features,
            is_premium: self.is_premium,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
