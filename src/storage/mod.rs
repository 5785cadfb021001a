pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::app::{App, NewApp};
use crate::models::contact::{ContactSubmission, NewContact};
use crate::models::purchase::{NewPurchase, Purchase, PurchaseStatus};
use crate::models::session::{DemoSession, NewDemoSession};
use crate::models::testimonial::Testimonial;
use crate::services::quota::QuotaCaps;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage connection failed: {0}")]
    Connection(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("row not found")]
    NotFound,
}

/// Result of an atomic quota-checked session insert.
#[derive(Debug)]
pub enum InsertOutcome {
    Created(DemoSession),
    DailyCapReached,
    ConcurrencyCapReached,
}

/// Persistence interface for the storefront and the demo-access subsystem.
///
/// Two interchangeable backends implement it: an in-memory store for tests
/// and demos and a SQLite store for production, selected by configuration.
/// The demo subsystem only ever talks to this trait; correctness under
/// concurrent issuance relies on `insert_demo_session` being atomic inside
/// the backend, not on any in-process locking above it.
#[async_trait]
pub trait Storage: Send + Sync {
    // Catalog (read side for the demo core; create is used by seeding).
    async fn apps(&self) -> Result<Vec<App>, StorageError>;
    async fn apps_by_category(&self, category: &str) -> Result<Vec<App>, StorageError>;
    async fn app(&self, id: &str) -> Result<Option<App>, StorageError>;
    async fn create_app(&self, new: NewApp) -> Result<App, StorageError>;

    async fn testimonials(&self) -> Result<Vec<Testimonial>, StorageError>;

    async fn create_contact(&self, new: NewContact) -> Result<ContactSubmission, StorageError>;

    async fn create_purchase(&self, new: NewPurchase) -> Result<Purchase, StorageError>;
    async fn purchase_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Purchase>, StorageError>;
    async fn update_purchase_status(
        &self,
        id: &str,
        status: PurchaseStatus,
    ) -> Result<Purchase, StorageError>;

    /// Checks both quota ceilings and inserts the session in one atomic
    /// step, so parallel issuance for the same IP+app pair cannot race
    /// past the caps.
    async fn insert_demo_session(
        &self,
        new: NewDemoSession,
        caps: QuotaCaps,
    ) -> Result<InsertOutcome, StorageError>;

    /// Token lookup joined with the owning app.
    async fn demo_session_by_token(
        &self,
        token: &str,
    ) -> Result<Option<(DemoSession, App)>, StorageError>;

    /// Active, unexpired sessions for an IP+app pair.
    async fn active_demo_session_count(
        &self,
        ip_address: &str,
        app_id: &str,
    ) -> Result<u32, StorageError>;

    /// Sessions created for an IP+app pair within the current UTC day.
    async fn demo_session_count_today(
        &self,
        ip_address: &str,
        app_id: &str,
    ) -> Result<u32, StorageError>;

    async fn deactivate_demo_session(&self, id: &str) -> Result<(), StorageError>;

    /// Batch-deactivates sessions whose `end_time` has passed; rows are
    /// retained for quota counting and audit. Returns the number touched.
    async fn cleanup_expired_demo_sessions(&self) -> Result<u64, StorageError>;
}
