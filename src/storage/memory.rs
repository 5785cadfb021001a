use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::app::{App, NewApp};
use crate::models::contact::{ContactSubmission, NewContact};
use crate::models::purchase::{NewPurchase, Purchase, PurchaseStatus};
use crate::models::session::{DemoSession, NewDemoSession};
use crate::models::testimonial::Testimonial;
use crate::services::quota::QuotaCaps;
use crate::storage::{InsertOutcome, Storage, StorageError};

#[derive(Default)]
struct Inner {
    apps: Vec<App>,
    testimonials: Vec<Testimonial>,
    contacts: Vec<ContactSubmission>,
    purchases: Vec<Purchase>,
    sessions: Vec<DemoSession>,
}

/// In-memory storage backend. Used for tests and demo deployments; all
/// state lives behind one `RwLock`, which makes the quota count-then-insert
/// sequence atomic under a single write guard.
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Store pre-populated with the portfolio catalog.
    pub fn seeded() -> Self {
        Self {
            inner: RwLock::new(Inner {
                apps: seed_apps(),
                testimonials: seed_testimonials(),
                ..Inner::default()
            }),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn apps(&self) -> Result<Vec<App>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .apps
            .iter()
            .filter(|app| app.is_active)
            .cloned()
            .collect())
    }

    async fn apps_by_category(&self, category: &str) -> Result<Vec<App>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .apps
            .iter()
            .filter(|app| app.is_active && app.category == category)
            .cloned()
            .collect())
    }

    async fn app(&self, id: &str) -> Result<Option<App>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.apps.iter().find(|app| app.id == id).cloned())
    }

    async fn create_app(&self, new: NewApp) -> Result<App, StorageError> {
        let app = new.into_app();
        self.inner.write().await.apps.push(app.clone());
        Ok(app)
    }

    async fn testimonials(&self) -> Result<Vec<Testimonial>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .testimonials
            .iter()
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }

    async fn create_contact(&self, new: NewContact) -> Result<ContactSubmission, StorageError> {
        let submission = new.into_submission();
        self.inner.write().await.contacts.push(submission.clone());
        Ok(submission)
    }

    async fn create_purchase(&self, new: NewPurchase) -> Result<Purchase, StorageError> {
        let purchase = new.into_purchase();
        self.inner.write().await.purchases.push(purchase.clone());
        Ok(purchase)
    }

    async fn purchase_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Purchase>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .purchases
            .iter()
            .find(|p| p.stripe_payment_intent_id == payment_intent_id)
            .cloned())
    }

    async fn update_purchase_status(
        &self,
        id: &str,
        status: PurchaseStatus,
    ) -> Result<Purchase, StorageError> {
        let mut inner = self.inner.write().await;
        let purchase = inner
            .purchases
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StorageError::NotFound)?;
        purchase.status = status;
        Ok(purchase.clone())
    }

    async fn insert_demo_session(
        &self,
        new: NewDemoSession,
        caps: QuotaCaps,
    ) -> Result<InsertOutcome, StorageError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        let today = now.date_naive();
        let issued_today = inner
            .sessions
            .iter()
            .filter(|s| {
                s.ip_address == new.ip_address
                    && s.app_id == new.app_id
                    && s.created_at.date_naive() == today
            })
            .count() as u32;
        if issued_today >= caps.daily {
            return Ok(InsertOutcome::DailyCapReached);
        }

        let active = inner
            .sessions
            .iter()
            .filter(|s| {
                s.ip_address == new.ip_address
                    && s.app_id == new.app_id
                    && s.is_active
                    && s.end_time >= now
            })
            .count() as u32;
        if active >= caps.concurrent {
            return Ok(InsertOutcome::ConcurrencyCapReached);
        }

        let session = new.into_session();
        inner.sessions.push(session.clone());
        Ok(InsertOutcome::Created(session))
    }

    async fn demo_session_by_token(
        &self,
        token: &str,
    ) -> Result<Option<(DemoSession, App)>, StorageError> {
        let inner = self.inner.read().await;
        let Some(session) = inner.sessions.iter().find(|s| s.session_token == token) else {
            return Ok(None);
        };
        let app = inner
            .apps
            .iter()
            .find(|app| app.id == session.app_id)
            .ok_or(StorageError::NotFound)?;
        Ok(Some((session.clone(), app.clone())))
    }

    async fn active_demo_session_count(
        &self,
        ip_address: &str,
        app_id: &str,
    ) -> Result<u32, StorageError> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .iter()
            .filter(|s| {
                s.ip_address == ip_address
                    && s.app_id == app_id
                    && s.is_active
                    && s.end_time >= now
            })
            .count() as u32)
    }

    async fn demo_session_count_today(
        &self,
        ip_address: &str,
        app_id: &str,
    ) -> Result<u32, StorageError> {
        let today = Utc::now().date_naive();
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .iter()
            .filter(|s| {
                s.ip_address == ip_address
                    && s.app_id == app_id
                    && s.created_at.date_naive() == today
            })
            .count() as u32)
    }

    async fn deactivate_demo_session(&self, id: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if let Some(session) = inner.sessions.iter_mut().find(|s| s.id == id) {
            session.is_active = false;
        }
        Ok(())
    }

    async fn cleanup_expired_demo_sessions(&self) -> Result<u64, StorageError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let mut touched = 0u64;
        for session in inner
            .sessions
            .iter_mut()
            .filter(|s| s.is_active && s.end_time < now)
        {
            session.is_active = false;
            touched += 1;
        }
        Ok(touched)
    }
}

fn seed_apps() -> Vec<App> {
    let now = Utc::now();
    let entry = |name: &str,
                 description: &str,
                 price: Option<&str>,
                 category: &str,
                 demo_url: Option<&str>,
                 is_premium: bool,
                 technologies: &[&str]| App {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: description.to_string(),
        long_description: None,
        price: price.map(str::to_string),
        category: category.to_string(),
        image_url: None,
        demo_url: demo_url.map(str::to_string),
        github_url: None,
        technologies: technologies.iter().map(|t| t.to_string()).collect(),
        features: Vec::new(),
        is_premium,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    vec![
        entry(
            "Asset Radar",
            "Market timing dashboard for gold, bitcoin and index funds",
            Some("49.99"),
            "web",
            Some("https://asset-radar.example.app"),
            true,
            &["React", "TypeScript", "Chart.js"],
        ),
        entry(
            "Stock Mentor",
            "S&P 500 screener with technical and fundamental scoring",
            Some("79.99"),
            "web",
            Some("https://stock-mentor.example.app"),
            true,
            &["Python", "Streamlit"],
        ),
        entry(
            "Dev Tools Suite",
            "Offline-first collection of developer productivity tools",
            None,
            "web",
            Some("https://devtools.example.app"),
            false,
            &["JavaScript", "Service Workers"],
        ),
        entry(
            "Harbor Estate",
            "Real estate discovery and management platform",
            Some("150000.00"),
            "web",
            None,
            true,
            &["React", "Next.js", "PostgreSQL"],
        ),
    ]
}

fn seed_testimonials() -> Vec<Testimonial> {
    let now = Utc::now();
    let entry = |name: &str, company: &str, position: &str, content: &str| Testimonial {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        company: Some(company.to_string()),
        position: Some(position.to_string()),
        content: content.to_string(),
        rating: "5.0".to_string(),
        avatar_url: None,
        is_active: true,
        created_at: now,
    };

    vec![
        entry(
            "Sarah Chen",
            "TechFlow Inc.",
            "Project Manager",
            "Delivered an exceptional app that exceeded our expectations.",
        ),
        entry(
            "Marcus Rodriguez",
            "StartupLab",
            "CTO",
            "Understood our requirements and delivered on time and within budget.",
        ),
        entry(
            "Emily Johnson",
            "DesignCo",
            "Creative Director",
            "The portfolio site noticeably improved our client acquisition rate.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn new_session(app_id: &str, ip: &str, end_offset_secs: i64) -> NewDemoSession {
        let now = Utc::now();
        NewDemoSession {
            app_id: app_id.to_string(),
            session_token: Uuid::new_v4().to_string(),
            ip_address: ip.to_string(),
            user_agent: None,
            start_time: now,
            end_time: now + Duration::seconds(end_offset_secs),
        }
    }

    #[tokio::test]
    async fn insert_enforces_daily_cap_atomically() {
        let storage = MemoryStorage::new();
        let caps = QuotaCaps::default();

        for _ in 0..2 {
            let outcome = storage
                .insert_demo_session(new_session("a1", "1.2.3.4", 600), caps)
                .await
                .unwrap();
            assert!(matches!(outcome, InsertOutcome::Created(_)));
        }

        let outcome = storage
            .insert_demo_session(new_session("a1", "1.2.3.4", 600), caps)
            .await
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::DailyCapReached));

        // A different IP is unaffected.
        let outcome = storage
            .insert_demo_session(new_session("a1", "5.6.7.8", 600), caps)
            .await
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Created(_)));
    }

    #[tokio::test]
    async fn cleanup_deactivates_but_retains_expired_rows() {
        let storage = MemoryStorage::new();
        let caps = QuotaCaps {
            daily: 10,
            concurrent: 10,
        };
        let app = storage
            .create_app(crate::models::app::NewApp {
                name: "Asset Radar".to_string(),
                description: "timing dashboard".to_string(),
                long_description: None,
                price: None,
                category: "web".to_string(),
                image_url: None,
                demo_url: Some("https://demo.example.app".to_string()),
                github_url: None,
                technologies: Vec::new(),
                features: Vec::new(),
                is_premium: false,
            })
            .await
            .unwrap();

        let outcome = storage
            .insert_demo_session(new_session(&app.id, "1.2.3.4", -5), caps)
            .await
            .unwrap();
        let session = match outcome {
            InsertOutcome::Created(s) => s,
            other => panic!("expected created, got {other:?}"),
        };

        let touched = storage.cleanup_expired_demo_sessions().await.unwrap();
        assert_eq!(touched, 1);

        // Row is still there for daily quota counting, just inactive.
        assert_eq!(
            storage
                .demo_session_count_today("1.2.3.4", &app.id)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            storage
                .active_demo_session_count("1.2.3.4", &app.id)
                .await
                .unwrap(),
            0
        );

        let (stored, _) = storage
            .demo_session_by_token(&session.session_token)
            .await
            .unwrap()
            .expect("session should survive cleanup");
        assert!(!stored.is_active);
    }

    #[tokio::test]
    async fn seeded_catalog_hides_nothing_active() {
        let storage = MemoryStorage::seeded();
        let apps = storage.apps().await.unwrap();
        assert!(!apps.is_empty());
        assert!(apps.iter().all(|a| a.is_active));
    }
}
