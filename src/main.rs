use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use synaptihand_api::config::config;
use synaptihand_api::database::{DatabaseManager, MemoryStore, PgStore, Store};
use synaptihand_api::services::bootstrap;
use synaptihand_api::{app, storage, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")))
        .init();

    let config = config();
    config.validate()?;
    tracing::info!("Starting SynaptiHand API in {:?} mode", config.environment);

    let store: Arc<dyn Store> = match &config.database.url {
        Some(_) => {
            let pool = DatabaseManager::connect(&config.database).await?;
            DatabaseManager::migrate(&pool).await?;
            Arc::new(PgStore::new(pool, config.database.slow_query_threshold_ms))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let storage = storage::from_config(&config.storage)?;
    tracing::info!("File storage backend: {}", storage.backend());

    bootstrap::seed_admin(&store, &config.security).await?;

    let state = AppState::new(store, storage, config.clone());
    let router = app(state);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("SynaptiHand API listening on http://{}", bind_addr);

    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}
