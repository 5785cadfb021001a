use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A time-boxed, IP/UA-bound credential granting proxied access to one
/// app's external demo deployment.
///
/// Usable iff `is_active && now <= end_time` and the requesting client
/// matches the binding recorded at issuance. Rows are deactivated on
/// expiry, never deleted; quota counting reads retained rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoSession {
    pub id: String,
    pub app_id: String,
    /// Unguessable bearer credential; the only key into the proxy path.
    pub session_token: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl DemoSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_active || now > self.end_time
    }
}

#[derive(Debug, Clone)]
pub struct NewDemoSession {
    pub app_id: String,
    pub session_token: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl NewDemoSession {
    pub fn into_session(self) -> DemoSession {
        DemoSession {
            id: uuid::Uuid::new_v4().to_string(),
            app_id: self.app_id,
            session_token: self.session_token,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            start_time: self.start_time,
            end_time: self.end_time,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(end_offset_secs: i64, is_active: bool) -> DemoSession {
        let now = Utc::now();
        DemoSession {
            id: "s1".to_string(),
            app_id: "a1".to_string(),
            session_token: "t".repeat(64),
            ip_address: "1.2.3.4".to_string(),
            user_agent: None,
            start_time: now - Duration::minutes(10),
            end_time: now + Duration::seconds(end_offset_secs),
            is_active,
            created_at: now,
        }
    }

    #[test]
    fn active_session_before_end_time_is_not_expired() {
        let s = session(60, true);
        assert!(!s.is_expired_at(Utc::now()));
    }

    #[test]
    fn end_time_is_inclusive() {
        let s = session(0, true);
        assert!(!s.is_expired_at(s.end_time));
        assert!(s.is_expired_at(s.end_time + Duration::seconds(1)));
    }

    #[test]
    fn deactivated_session_is_expired_regardless_of_end_time() {
        let s = session(600, false);
        assert!(s.is_expired_at(Utc::now()));
    }
}
