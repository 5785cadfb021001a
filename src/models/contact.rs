use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub id: String,
    pub name: String,
    pub email: String,
    pub project_type: Option<String>,
    pub budget: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub name: String,
    pub email: String,
    pub project_type: Option<String>,
    pub budget: Option<String>,
    pub message: String,
}

impl NewContact {
    pub fn into_submission(self) -> ContactSubmission {
        ContactSubmission {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            email: self.email,
            project_type: self.project_type,
            budget: self.budget,
            message: self.message,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}
