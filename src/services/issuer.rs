use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::error::DemoAccessError;
use crate::models::responses::DemoAccessGranted;
use crate::models::session::NewDemoSession;
use crate::services::quota::QuotaGate;
use crate::storage::{InsertOutcome, Storage};
use crate::utils::token::generate_session_token;

/// Mints demo sessions. Eligibility is checked in a fixed order (app
/// exists, app has a demo target, daily cap, concurrency cap) so the
/// client always gets the most specific denial.
pub struct SessionIssuer {
    storage: Arc<dyn Storage>,
    gate: QuotaGate,
    session_minutes: i64,
}

impl SessionIssuer {
    pub fn new(storage: Arc<dyn Storage>, gate: QuotaGate, session_minutes: i64) -> Self {
        Self {
            storage,
            gate,
            session_minutes,
        }
    }

    pub async fn issue(
        &self,
        app_id: &str,
        ip_address: &str,
        user_agent: Option<&str>,
    ) -> Result<DemoAccessGranted, DemoAccessError> {
        let app = self
            .storage
            .app(app_id)
            .await?
            .ok_or(DemoAccessError::AppNotFound)?;

        if app.demo_url.as_deref().is_none_or(str::is_empty) {
            return Err(DemoAccessError::DemoUnavailable);
        }

        self.gate.check(self.storage.as_ref(), ip_address, &app).await?;

        let now = Utc::now();
        let new = NewDemoSession {
            app_id: app.id.clone(),
            session_token: generate_session_token(),
            ip_address: ip_address.to_string(),
            user_agent: user_agent.map(str::to_string),
            start_time: now,
            end_time: now + Duration::minutes(self.session_minutes),
        };

        // The backend re-checks both caps atomically with the insert, so a
        // lost race between the gate check and here still lands on the cap.
        let session = match self
            .storage
            .insert_demo_session(new, self.gate.caps())
            .await?
        {
            InsertOutcome::Created(session) => session,
            InsertOutcome::DailyCapReached => {
                return Err(DemoAccessError::QuotaExceeded {
                    app: app.summary(),
                })
            }
            InsertOutcome::ConcurrencyCapReached => {
                return Err(DemoAccessError::ConcurrencyExceeded {
                    app: app.summary(),
                })
            }
        };

        tracing::info!(
            "issued demo session for app {} to {} (expires {})",
            app.name,
            ip_address,
            session.end_time
        );

        // Opportunistic housekeeping; a failure here must never fail issuance.
        let storage = Arc::clone(&self.storage);
        tokio::spawn(async move {
            match storage.cleanup_expired_demo_sessions().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("deactivated {n} expired demo sessions"),
                Err(err) => tracing::warn!("expired-session cleanup failed: {err}"),
            }
        });

        Ok(DemoAccessGranted {
            session_token: session.session_token,
            expires_at: session.end_time,
            duration_minutes: self.session_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::app::NewApp;
    use crate::services::quota::QuotaCaps;
    use crate::storage::memory::MemoryStorage;

    fn catalog_app(demo_url: Option<&str>) -> NewApp {
        NewApp {
            name: "Asset Radar".to_string(),
            description: "market timing dashboard".to_string(),
            long_description: None,
            price: Some("49.99".to_string()),
            category: "web".to_string(),
            image_url: None,
            demo_url: demo_url.map(str::to_string),
            github_url: None,
            technologies: Vec::new(),
            features: Vec::new(),
            is_premium: true,
        }
    }

    fn issuer(storage: Arc<dyn Storage>) -> SessionIssuer {
        SessionIssuer::new(storage, QuotaGate::new(QuotaCaps::default()), 10)
    }

    #[tokio::test]
    async fn unknown_app_is_not_found() {
        let storage = Arc::new(MemoryStorage::new());
        let err = issuer(storage)
            .issue("missing", "1.2.3.4", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DemoAccessError::AppNotFound));
    }

    #[tokio::test]
    async fn app_without_demo_url_never_creates_a_row() {
        let storage = Arc::new(MemoryStorage::new());
        let app = storage.create_app(catalog_app(None)).await.unwrap();

        let err = issuer(storage.clone())
            .issue(&app.id, "1.2.3.4", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DemoAccessError::DemoUnavailable));
        assert_eq!(
            storage
                .demo_session_count_today("1.2.3.4", &app.id)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn issued_session_spans_exactly_the_configured_window() {
        let storage = Arc::new(MemoryStorage::new());
        let app = storage
            .create_app(catalog_app(Some("https://demo.example.app")))
            .await
            .unwrap();

        let granted = issuer(storage.clone())
            .issue(&app.id, "1.2.3.4", Some("test-agent"))
            .await
            .unwrap();
        assert_eq!(granted.duration_minutes, 10);

        let (session, _) = storage
            .demo_session_by_token(&granted.session_token)
            .await
            .unwrap()
            .expect("session persisted");
        assert_eq!(session.end_time - session.start_time, Duration::minutes(10));
        assert_eq!(session.end_time, granted.expires_at);
        assert_eq!(session.user_agent.as_deref(), Some("test-agent"));
    }

    #[tokio::test]
    async fn third_issuance_same_day_hits_the_daily_quota() {
        let storage = Arc::new(MemoryStorage::new());
        let app = storage
            .create_app(catalog_app(Some("https://demo.example.app")))
            .await
            .unwrap();
        let issuer = issuer(storage.clone());

        issuer.issue(&app.id, "1.2.3.4", None).await.unwrap();
        issuer.issue(&app.id, "1.2.3.4", None).await.unwrap();

        let err = issuer.issue(&app.id, "1.2.3.4", None).await.unwrap_err();
        match err {
            DemoAccessError::QuotaExceeded { app: summary }
            | DemoAccessError::ConcurrencyExceeded { app: summary } => {
                assert_eq!(summary.price.as_deref(), Some("49.99"));
            }
            other => panic!("expected quota denial, got {other:?}"),
        }

        // A different client is unaffected.
        issuer.issue(&app.id, "9.9.9.9", None).await.unwrap();
    }

    #[tokio::test]
    async fn parallel_issuance_cannot_race_past_the_cap() {
        let storage = Arc::new(MemoryStorage::new());
        let app = storage
            .create_app(catalog_app(Some("https://demo.example.app")))
            .await
            .unwrap();
        let issuer = Arc::new(issuer(storage.clone()));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let issuer = Arc::clone(&issuer);
            let app_id = app.id.clone();
            handles.push(tokio::spawn(async move {
                issuer.issue(&app_id, "1.2.3.4", None).await
            }));
        }

        let mut granted = 0u32;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                granted += 1;
            }
        }
        assert!(granted <= 2, "cap leaked: {granted} sessions issued");
        assert_eq!(
            storage
                .demo_session_count_today("1.2.3.4", &app.id)
                .await
                .unwrap(),
            granted
        );
    }
}
