use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PurchaseStatus::Pending),
            "completed" => Some(PurchaseStatus::Completed),
            "failed" => Some(PurchaseStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: String,
    pub app_id: String,
    pub customer_email: String,
    pub customer_name: Option<String>,
    /// Decimal amount as a string, mirroring the app price it was taken from.
    pub amount: String,
    pub stripe_payment_intent_id: String,
    pub status: PurchaseStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub app_id: String,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub amount: String,
    pub stripe_payment_intent_id: String,
}

impl NewPurchase {
    pub fn into_purchase(self) -> Purchase {
        Purchase {
            id: uuid::Uuid::new_v4().to_string(),
            app_id: self.app_id,
            customer_email: self.customer_email,
            customer_name: self.customer_name,
            amount: self.amount,
            stripe_payment_intent_id: self.stripe_payment_intent_id,
            status: PurchaseStatus::Pending,
            created_at: Utc::now(),
        }
    }
}
