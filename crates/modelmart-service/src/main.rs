//! Modelmart Service - metered prediction gateway and usage analytics.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modelmart_service::{create_router, AppState, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,modelmart=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Modelmart Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        inference_remote = config.inference_url.is_some(),
        sessions_enabled = config.session_secret.is_some(),
        admin_enabled = config.admin_api_key.is_some(),
        "Service configuration loaded"
    );

    let state = build_state(config.clone())?;

    let app = create_router(state);

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn build_state(config: ServiceConfig) -> Result<AppState, Box<dyn std::error::Error>> {
    use std::sync::Arc;

    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(modelmart_store::RocksStore::open(&config.data_dir)?);
    Ok(AppState::new(store, config))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn build_state(config: ServiceConfig) -> Result<AppState, Box<dyn std::error::Error>> {
    use std::sync::Arc;

    tracing::warn!("Built without rocksdb-backend; using in-memory store, data will not persist");
    let store = Arc::new(modelmart_store::MemoryStore::new());
    Ok(AppState::new(store, config))
}
