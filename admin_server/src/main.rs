//! HTTP server for the showcase admin API.
//!
//! Reads configuration from the environment (`.env` supported), prepares the database,
//! then serves on `BIND_ADDR`.

use showcase_admin::{
    app, ensure_database_exists, ensure_schema, notify, AppState, FileStore, MemoryFileStore, ResourceRegistry,
    S3FileStore, Settings, TokenVerifier,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("showcase_admin=info,admin_server=info")),
        )
        .init();

    let settings = Settings::from_env()?;

    ensure_database_exists(&settings.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;
    ensure_schema(&pool).await?;

    let registry = ResourceRegistry::standard()?;
    let files: Arc<dyn FileStore> = match &settings.s3_bucket {
        Some(bucket) => {
            tracing::info!(bucket = %bucket, "uploads go to s3");
            Arc::new(S3FileStore::from_env(bucket.clone(), settings.s3_prefix.clone()).await)
        }
        None => {
            tracing::warn!("S3_BUCKET not set; uploads are kept in memory");
            Arc::new(MemoryFileStore::new())
        }
    };
    let notifiers = notify::from_settings(settings.telegram.clone(), settings.smtp.clone());
    let tokens = TokenVerifier::new(&settings.jwt_secret, settings.jwt_issuer.as_deref());

    let bind_addr = settings.bind_addr.clone();
    let state = AppState {
        pool,
        settings: Arc::new(settings),
        registry: Arc::new(registry),
        files,
        notifiers: Arc::new(notifiers),
        tokens: Arc::new(tokens),
    };

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        resources = state.registry.len(),
        notifiers = state.notifiers.len(),
        "admin server listening"
    );
    axum::serve(listener, app(state)).await?;
    Ok(())
}
