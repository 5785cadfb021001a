use std::sync::Arc;

use chrono::Utc;

use crate::error::DemoAccessError;
use crate::models::app::App;
use crate::models::session::DemoSession;
use crate::storage::Storage;

/// Re-checks a token on every proxied request; there is no cached
/// validation state, which is what makes server-side expiry authoritative
/// regardless of client behavior.
pub struct SessionValidator {
    storage: Arc<dyn Storage>,
}

impl SessionValidator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Check order is part of the contract: existence before expiry before
    /// binding. An unknown token leaks no app data; an expired-but-real
    /// token returns the app so the caller can surface the purchase upsell.
    pub async fn validate(
        &self,
        token: &str,
        request_ip: Option<&str>,
        request_user_agent: Option<&str>,
    ) -> Result<(DemoSession, App), DemoAccessError> {
        let Some((session, app)) = self.storage.demo_session_by_token(token).await? else {
            return Err(DemoAccessError::SessionNotFound);
        };

        if session.is_expired_at(Utc::now()) {
            return Err(DemoAccessError::SessionExpired {
                app: Some(app.summary()),
            });
        }

        if let Some(ip) = request_ip {
            if ip != session.ip_address {
                tracing::warn!(
                    "demo session {} presented from {} but issued to {}",
                    session.id,
                    ip,
                    session.ip_address
                );
                return Err(DemoAccessError::IpMismatch);
            }
        }

        if let (Some(request_ua), Some(bound_ua)) = (request_user_agent, session.user_agent.as_deref())
        {
            if !request_ua.is_empty() && !bound_ua.is_empty() && request_ua != bound_ua {
                return Err(DemoAccessError::UaMismatch);
            }
        }

        Ok((session, app))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::models::app::NewApp;
    use crate::models::session::NewDemoSession;
    use crate::services::quota::QuotaCaps;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::InsertOutcome;

    async fn seeded_session(
        end_offset_secs: i64,
        user_agent: Option<&str>,
    ) -> (Arc<MemoryStorage>, String, String) {
        let storage = Arc::new(MemoryStorage::new());
        let app = storage
            .create_app(NewApp {
                name: "Stock Mentor".to_string(),
                description: "screener".to_string(),
                long_description: None,
                price: Some("79.99".to_string()),
                category: "web".to_string(),
                image_url: None,
                demo_url: Some("https://stock-mentor.example.app".to_string()),
                github_url: None,
                technologies: Vec::new(),
                features: Vec::new(),
                is_premium: true,
            })
            .await
            .unwrap();

        let now = Utc::now();
        let outcome = storage
            .insert_demo_session(
                NewDemoSession {
                    app_id: app.id.clone(),
                    session_token: "a".repeat(64),
                    ip_address: "1.2.3.4".to_string(),
                    user_agent: user_agent.map(str::to_string),
                    start_time: now - Duration::minutes(1),
                    end_time: now + Duration::seconds(end_offset_secs),
                },
                QuotaCaps::default(),
            )
            .await
            .unwrap();
        let token = match outcome {
            InsertOutcome::Created(s) => s.session_token,
            other => panic!("expected created, got {other:?}"),
        };
        (storage, token, app.id)
    }

    #[tokio::test]
    async fn unknown_token_leaks_nothing() {
        let storage = Arc::new(MemoryStorage::new());
        let err = SessionValidator::new(storage)
            .validate("deadbeef", Some("1.2.3.4"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DemoAccessError::SessionNotFound));
    }

    #[tokio::test]
    async fn valid_session_is_idempotently_valid() {
        let (storage, token, app_id) = seeded_session(600, Some("agent")).await;
        let validator = SessionValidator::new(storage);

        for _ in 0..3 {
            let (session, app) = validator
                .validate(&token, Some("1.2.3.4"), Some("agent"))
                .await
                .unwrap();
            assert_eq!(session.session_token, token);
            assert_eq!(app.id, app_id);
        }
    }

    #[tokio::test]
    async fn expired_session_still_returns_the_app_for_upsell() {
        let (storage, token, _) = seeded_session(-5, None).await;
        let validator = SessionValidator::new(storage);

        for _ in 0..2 {
            let err = validator
                .validate(&token, Some("1.2.3.4"), None)
                .await
                .unwrap_err();
            match err {
                DemoAccessError::SessionExpired { app } => {
                    let app = app.expect("expired session carries the app");
                    assert_eq!(app.price.as_deref(), Some("79.99"));
                }
                other => panic!("expected expiry, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn ip_mismatch_is_a_security_violation_not_expiry() {
        let (storage, token, _) = seeded_session(600, None).await;
        let err = SessionValidator::new(storage)
            .validate(&token, Some("9.9.9.9"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DemoAccessError::IpMismatch));
    }

    #[tokio::test]
    async fn user_agent_mismatch_is_rejected() {
        let (storage, token, _) = seeded_session(600, Some("firefox")).await;
        let validator = SessionValidator::new(storage);

        let err = validator
            .validate(&token, Some("1.2.3.4"), Some("curl"))
            .await
            .unwrap_err();
        assert!(matches!(err, DemoAccessError::UaMismatch));

        // An absent request UA is not a mismatch.
        validator
            .validate(&token, Some("1.2.3.4"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deactivated_session_counts_as_expired() {
        let (storage, token, _) = seeded_session(600, None).await;
        let (session, _) = storage
            .demo_session_by_token(&token)
            .await
            .unwrap()
            .unwrap();
        storage.deactivate_demo_session(&session.id).await.unwrap();

        let err = SessionValidator::new(storage)
            .validate(&token, Some("1.2.3.4"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DemoAccessError::SessionExpired { .. }));
    }
}
