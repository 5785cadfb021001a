use std::env;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub demo: DemoConfig,
    pub storage: StorageConfig,
    pub payments: PaymentConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// True when a reverse proxy fronts the server and appends the real
    /// client address as the last `X-Forwarded-For` entry.
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DemoConfig {
    /// Fixed demo window length; `end_time = start_time + session_minutes`.
    pub session_minutes: i64,
    /// Sessions issued per IP+app per UTC calendar day.
    pub daily_session_cap: u32,
    /// Simultaneously active, unexpired sessions per IP+app.
    pub concurrent_session_cap: u32,
    /// Transport ceiling on issuance calls per IP per 24h.
    pub issuance_calls_per_day: u32,
    /// General API requests per IP per minute.
    pub api_requests_per_minute: u32,
    /// Contact form submissions per IP per 15 minutes.
    pub contact_requests_per_window: u32,
    /// User-Agent sent to upstream demo deployments.
    pub proxy_user_agent: String,
}

impl DemoConfig {
    pub fn quota_caps(&self) -> crate::services::quota::QuotaCaps {
        crate::services::quota::QuotaCaps {
            daily: self.daily_session_cap,
            concurrent: self.concurrent_session_cap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub sqlite_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
}

impl PaymentConfig {
    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    pub notify_address: Option<String>,
}

impl MailConfig {
    pub fn is_configured(&self) -> bool {
        self.notify_address.is_some()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .or_else(|_| env::var("SERVER_PORT"))
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
                cors_origins: env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                trust_proxy: env::var("TRUST_PROXY")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
            },
            demo: DemoConfig {
                session_minutes: env::var("DEMO_SESSION_MINUTES")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                daily_session_cap: env::var("DEMO_DAILY_CAP")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                concurrent_session_cap: env::var("DEMO_CONCURRENT_CAP")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                issuance_calls_per_day: env::var("DEMO_ISSUANCE_CALLS_PER_DAY")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                api_requests_per_minute: env::var("API_REQUESTS_PER_MINUTE")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .unwrap_or(600),
                contact_requests_per_window: env::var("CONTACT_REQUESTS_PER_WINDOW")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
                proxy_user_agent: env::var("DEMO_PROXY_USER_AGENT")
                    .unwrap_or_else(|_| "DemoGateway/1.0".to_string()),
            },
            storage: StorageConfig {
                backend: match env::var("STORAGE_BACKEND")
                    .unwrap_or_else(|_| "memory".to_string())
                    .to_lowercase()
                    .as_str()
                {
                    "sqlite" => StorageBackend::Sqlite,
                    _ => StorageBackend::Memory,
                },
                sqlite_path: env::var("SQLITE_PATH")
                    .unwrap_or_else(|_| "demo_gateway.sqlite3".to_string()),
            },
            payments: PaymentConfig {
                secret_key: env::var("STRIPE_SECRET_KEY").ok(),
                webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").ok(),
            },
            mail: MailConfig {
                notify_address: env::var("CONTACT_NOTIFY_ADDRESS").ok(),
            },
        })
    }
}
