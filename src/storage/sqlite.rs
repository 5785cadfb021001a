use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::models::app::{App, NewApp};
use crate::models::contact::{ContactSubmission, NewContact};
use crate::models::purchase::{NewPurchase, Purchase, PurchaseStatus};
use crate::models::session::{DemoSession, NewDemoSession};
use crate::models::testimonial::Testimonial;
use crate::services::quota::QuotaCaps;
use crate::storage::{InsertOutcome, Storage, StorageError};

/// SQLite-backed storage. The quota count-then-insert sequence runs inside
/// one transaction so concurrent issuance cannot race past the caps.
pub struct SqliteStorage {
    pool: Pool<Sqlite>,
}

fn query_err(err: sqlx::Error) -> StorageError {
    StorageError::Query(err.to_string())
}

#[derive(Debug, sqlx::FromRow)]
struct AppRow {
    id: String,
    name: String,
    description: String,
    long_description: Option<String>,
    price: Option<String>,
    category: String,
    image_url: Option<String>,
    demo_url: Option<String>,
    github_url: Option<String>,
    technologies: String,
    features: String,
    is_premium: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AppRow {
    fn into_app(self) -> App {
        App {
            id: self.id,
            name: self.name,
            description: self.description,
            long_description: self.long_description,
            price: self.price,
            category: self.category,
            image_url: self.image_url,
            demo_url: self.demo_url,
            github_url: self.github_url,
            technologies: serde_json::from_str(&self.technologies).unwrap_or_default(),
            features: serde_json::from_str(&self.features).unwrap_or_default(),
            is_premium: self.is_premium,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    app_id: String,
    session_token: String,
    ip_address: String,
    user_agent: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> DemoSession {
        DemoSession {
            id: self.id,
            app_id: self.app_id,
            session_token: self.session_token,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            start_time: self.start_time,
            end_time: self.end_time,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: String,
    app_id: String,
    customer_email: String,
    customer_name: Option<String>,
    amount: String,
    stripe_payment_intent_id: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl PurchaseRow {
    fn into_purchase(self) -> Result<Purchase, StorageError> {
        let status = PurchaseStatus::parse(&self.status)
            .ok_or_else(|| StorageError::Query(format!("unknown purchase status {}", self.status)))?;
        Ok(Purchase {
            id: self.id,
            app_id: self.app_id,
            customer_email: self.customer_email,
            customer_name: self.customer_name,
            amount: self.amount,
            stripe_payment_intent_id: self.stripe_payment_intent_id,
            status,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TestimonialRow {
    id: String,
    name: String,
    company: Option<String>,
    position: Option<String>,
    content: String,
    rating: String,
    avatar_url: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TestimonialRow {
    fn into_testimonial(self) -> Testimonial {
        Testimonial {
            id: self.id,
            name: self.name,
            company: self.company,
            position: self.position,
            content: self.content,
            rating: self.rating,
            avatar_url: self.avatar_url,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

const APP_COLUMNS: &str = "id, name, description, long_description, price, category, image_url, \
                           demo_url, github_url, technologies, features, is_premium, is_active, \
                           created_at, updated_at";

const SESSION_COLUMNS: &str = "id, app_id, session_token, ip_address, user_agent, start_time, \
                               end_time, is_active, created_at";

impl SqliteStorage {
    pub async fn connect(path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        let statements = [
            r#"CREATE TABLE IF NOT EXISTS apps (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                long_description TEXT,
                price TEXT,
                category TEXT NOT NULL,
                image_url TEXT,
                demo_url TEXT,
                github_url TEXT,
                technologies TEXT NOT NULL DEFAULT '[]',
                features TEXT NOT NULL DEFAULT '[]',
                is_premium INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS testimonials (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                company TEXT,
                position TEXT,
                content TEXT NOT NULL,
                rating TEXT NOT NULL DEFAULT '5.0',
                avatar_url TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS contact_submissions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                project_type TEXT,
                budget TEXT,
                message TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS purchases (
                id TEXT PRIMARY KEY,
                app_id TEXT NOT NULL REFERENCES apps(id),
                customer_email TEXT NOT NULL,
                customer_name TEXT,
                amount TEXT NOT NULL,
                stripe_payment_intent_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS demo_sessions (
                id TEXT PRIMARY KEY,
                app_id TEXT NOT NULL REFERENCES apps(id),
                session_token TEXT NOT NULL UNIQUE,
                ip_address TEXT NOT NULL,
                user_agent TEXT,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_demo_sessions_ip_app_created \
             ON demo_sessions (ip_address, app_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_demo_sessions_ip_app_active \
             ON demo_sessions (ip_address, app_id, is_active, end_time)",
            "CREATE INDEX IF NOT EXISTS idx_purchases_payment_intent \
             ON purchases (stripe_payment_intent_id)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(query_err)?;
        }

        Ok(())
    }
}

/// Quota counts plus the insert, run inside an already-open immediate
/// transaction. Cap outcomes are `Ok` on purpose; only the commit/rollback
/// decision cares about `Err`.
async fn count_and_insert(
    conn: &mut sqlx::SqliteConnection,
    new: NewDemoSession,
    caps: QuotaCaps,
) -> Result<InsertOutcome, StorageError> {
    let now = Utc::now();
    let day_start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc();
    let day_end = day_start + Duration::days(1);

    let issued_today: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM demo_sessions \
         WHERE ip_address = ?1 AND app_id = ?2 AND created_at >= ?3 AND created_at < ?4",
    )
    .bind(&new.ip_address)
    .bind(&new.app_id)
    .bind(day_start)
    .bind(day_end)
    .fetch_one(&mut *conn)
    .await
    .map_err(query_err)?;
    if issued_today >= i64::from(caps.daily) {
        return Ok(InsertOutcome::DailyCapReached);
    }

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM demo_sessions \
         WHERE ip_address = ?1 AND app_id = ?2 AND is_active = 1 AND end_time >= ?3",
    )
    .bind(&new.ip_address)
    .bind(&new.app_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(query_err)?;
    if active >= i64::from(caps.concurrent) {
        return Ok(InsertOutcome::ConcurrencyCapReached);
    }

    let session = new.into_session();
    sqlx::query(
        "INSERT INTO demo_sessions (id, app_id, session_token, ip_address, user_agent, \
         start_time, end_time, is_active, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(&session.id)
    .bind(&session.app_id)
    .bind(&session.session_token)
    .bind(&session.ip_address)
    .bind(&session.user_agent)
    .bind(session.start_time)
    .bind(session.end_time)
    .bind(session.is_active)
    .bind(session.created_at)
    .execute(&mut *conn)
    .await
    .map_err(query_err)?;

    Ok(InsertOutcome::Created(session))
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn apps(&self) -> Result<Vec<App>, StorageError> {
        let rows = sqlx::query_as::<_, AppRow>(&format!(
            "SELECT {APP_COLUMNS} FROM apps WHERE is_active = 1 ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(rows.into_iter().map(AppRow::into_app).collect())
    }

    async fn apps_by_category(&self, category: &str) -> Result<Vec<App>, StorageError> {
        let rows = sqlx::query_as::<_, AppRow>(&format!(
            "SELECT {APP_COLUMNS} FROM apps WHERE is_active = 1 AND category = ?1 \
             ORDER BY created_at DESC"
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(rows.into_iter().map(AppRow::into_app).collect())
    }

    async fn app(&self, id: &str) -> Result<Option<App>, StorageError> {
        let row = sqlx::query_as::<_, AppRow>(&format!(
            "SELECT {APP_COLUMNS} FROM apps WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(row.map(AppRow::into_app))
    }

    async fn create_app(&self, new: NewApp) -> Result<App, StorageError> {
        let app = new.into_app();
        sqlx::query(
            "INSERT INTO apps (id, name, description, long_description, price, category, \
             image_url, demo_url, github_url, technologies, features, is_premium, is_active, \
             created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(&app.id)
        .bind(&app.name)
        .bind(&app.description)
        .bind(&app.long_description)
        .bind(&app.price)
        .bind(&app.category)
        .bind(&app.image_url)
        .bind(&app.demo_url)
        .bind(&app.github_url)
        .bind(serde_json::to_string(&app.technologies).unwrap_or_else(|_| "[]".to_string()))
        .bind(serde_json::to_string(&app.features).unwrap_or_else(|_| "[]".to_string()))
        .bind(app.is_premium)
        .bind(app.is_active)
        .bind(app.created_at)
        .bind(app.updated_at)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(app)
    }

    async fn testimonials(&self) -> Result<Vec<Testimonial>, StorageError> {
        let rows = sqlx::query_as::<_, TestimonialRow>(
            "SELECT id, name, company, position, content, rating, avatar_url, is_active, \
             created_at FROM testimonials WHERE is_active = 1 ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(rows.into_iter().map(TestimonialRow::into_testimonial).collect())
    }

    async fn create_contact(&self, new: NewContact) -> Result<ContactSubmission, StorageError> {
        let submission = new.into_submission();
        sqlx::query(
            "INSERT INTO contact_submissions (id, name, email, project_type, budget, message, \
             is_read, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&submission.id)
        .bind(&submission.name)
        .bind(&submission.email)
        .bind(&submission.project_type)
        .bind(&submission.budget)
        .bind(&submission.message)
        .bind(submission.is_read)
        .bind(submission.created_at)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(submission)
    }

    async fn create_purchase(&self, new: NewPurchase) -> Result<Purchase, StorageError> {
        let purchase = new.into_purchase();
        sqlx::query(
            "INSERT INTO purchases (id, app_id, customer_email, customer_name, amount, \
             stripe_payment_intent_id, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&purchase.id)
        .bind(&purchase.app_id)
        .bind(&purchase.customer_email)
        .bind(&purchase.customer_name)
        .bind(&purchase.amount)
        .bind(&purchase.stripe_payment_intent_id)
        .bind(purchase.status.as_str())
        .bind(purchase.created_at)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(purchase)
    }

    async fn purchase_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Purchase>, StorageError> {
        let row = sqlx::query_as::<_, PurchaseRow>(
            "SELECT id, app_id, customer_email, customer_name, amount, \
             stripe_payment_intent_id, status, created_at FROM purchases \
             WHERE stripe_payment_intent_id = ?1",
        )
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;
        row.map(PurchaseRow::into_purchase).transpose()
    }

    async fn update_purchase_status(
        &self,
        id: &str,
        status: PurchaseStatus,
    ) -> Result<Purchase, StorageError> {
        let updated = sqlx::query("UPDATE purchases SET status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        if updated.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let row = sqlx::query_as::<_, PurchaseRow>(
            "SELECT id, app_id, customer_email, customer_name, amount, \
             stripe_payment_intent_id, status, created_at FROM purchases WHERE id = ?1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(query_err)?;
        row.into_purchase()
    }

    async fn insert_demo_session(
        &self,
        new: NewDemoSession,
        caps: QuotaCaps,
    ) -> Result<InsertOutcome, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(query_err)?;

        // Take the write lock up front; a deferred transaction would let two
        // issuers snapshot the same counts and fail on the write upgrade.
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(query_err)?;

        let outcome = count_and_insert(&mut conn, new, caps).await;

        match &outcome {
            Ok(_) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(query_err)?;
            }
            Err(_) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            }
        }

        outcome
    }

    async fn demo_session_by_token(
        &self,
        token: &str,
    ) -> Result<Option<(DemoSession, App)>, StorageError> {
        let session = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM demo_sessions WHERE session_token = ?1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        let Some(session) = session else {
            return Ok(None);
        };
        let session = session.into_session();

        let app = sqlx::query_as::<_, AppRow>(&format!(
            "SELECT {APP_COLUMNS} FROM apps WHERE id = ?1"
        ))
        .bind(&session.app_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?
        .ok_or(StorageError::NotFound)?;

        Ok(Some((session, app.into_app())))
    }

    async fn active_demo_session_count(
        &self,
        ip_address: &str,
        app_id: &str,
    ) -> Result<u32, StorageError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM demo_sessions \
             WHERE ip_address = ?1 AND app_id = ?2 AND is_active = 1 AND end_time >= ?3",
        )
        .bind(ip_address)
        .bind(app_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(count as u32)
    }

    async fn demo_session_count_today(
        &self,
        ip_address: &str,
        app_id: &str,
    ) -> Result<u32, StorageError> {
        let day_start = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc();
        let day_end = day_start + Duration::days(1);

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM demo_sessions \
             WHERE ip_address = ?1 AND app_id = ?2 AND created_at >= ?3 AND created_at < ?4",
        )
        .bind(ip_address)
        .bind(app_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(count as u32)
    }

    async fn deactivate_demo_session(&self, id: &str) -> Result<(), StorageError> {
        sqlx::query("UPDATE demo_sessions SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn cleanup_expired_demo_sessions(&self) -> Result<u64, StorageError> {
        let result =
            sqlx::query("UPDATE demo_sessions SET is_active = 0 WHERE is_active = 1 AND end_time < ?1")
                .bind(Utc::now())
                .execute(&self.pool)
                .await
                .map_err(query_err)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::app::NewApp;

    async fn temp_storage() -> (Arc<SqliteStorage>, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!(
            "demo_gateway_{}.sqlite3",
            uuid::Uuid::new_v4()
        ));
        let storage = SqliteStorage::connect(path.to_str().expect("utf8 temp path"))
            .await
            .expect("temp database");
        (Arc::new(storage), path)
    }

    fn session_for(app_id: &str, ip: &str) -> NewDemoSession {
        let now = Utc::now();
        NewDemoSession {
            app_id: app_id.to_string(),
            session_token: uuid::Uuid::new_v4().to_string(),
            ip_address: ip.to_string(),
            user_agent: None,
            start_time: now,
            end_time: now + Duration::minutes(10),
        }
    }

    #[tokio::test]
    async fn parallel_issuance_lands_on_the_cap_without_errors() {
        let (storage, path) = temp_storage().await;
        let app = storage
            .create_app(NewApp {
                name: "Asset Radar".to_string(),
                description: "timing dashboard".to_string(),
                long_description: None,
                price: Some("49.99".to_string()),
                category: "web".to_string(),
                image_url: None,
                demo_url: Some("https://demo.example.app".to_string()),
                github_url: None,
                technologies: Vec::new(),
                features: Vec::new(),
                is_premium: true,
            })
            .await
            .unwrap();

        let caps = QuotaCaps::default();
        let mut handles = Vec::new();
        for _ in 0..6 {
            let storage = Arc::clone(&storage);
            let new = session_for(&app.id, "1.2.3.4");
            handles.push(tokio::spawn(async move {
                storage.insert_demo_session(new, caps).await
            }));
        }

        let mut created = 0u32;
        for handle in handles {
            // Every contender gets a clean outcome, never a lock error.
            match handle.await.unwrap().unwrap() {
                InsertOutcome::Created(_) => created += 1,
                InsertOutcome::DailyCapReached | InsertOutcome::ConcurrencyCapReached => {}
            }
        }
        assert_eq!(created, caps.daily);

        assert_eq!(
            storage
                .demo_session_count_today("1.2.3.4", &app.id)
                .await
                .unwrap(),
            caps.daily
        );

        std::fs::remove_file(path).ok();
    }
}
