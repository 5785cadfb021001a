use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::interval;

use demo_gateway::{
    api::{create_api_router, AppContext},
    config::{Config, StorageBackend},
    storage::{memory::MemoryStorage, sqlite::SqliteStorage, Storage},
};

const CLEANUP_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("Starting Demo Gateway");

    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory storage with seed catalog");
            Arc::new(MemoryStorage::seeded())
        }
        StorageBackend::Sqlite => {
            tracing::info!("using sqlite storage at {}", config.storage.sqlite_path);
            Arc::new(SqliteStorage::connect(&config.storage.sqlite_path).await?)
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let context = AppContext::new(config, storage.clone())
        .map_err(|e| anyhow::anyhow!("context setup failed: {e}"))?;

    // Expired sessions stay in the store for quota counting; this pass just
    // flips them inactive so concurrency counts drop promptly.
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));

        loop {
            interval.tick().await;
            match storage.cleanup_expired_demo_sessions().await {
                Ok(0) => {}
                Ok(count) => tracing::info!("deactivated {count} expired demo sessions"),
                Err(e) => tracing::error!("demo session cleanup failed: {e}"),
            }
        }
    });

    let app = create_api_router(context);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Demo Gateway running on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
