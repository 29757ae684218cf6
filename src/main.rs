//! Join Vapor Bontang storefront service

use anyhow::{Context, Result};
use joinvapor_store::api::{router, AppState};
use joinvapor_store::config::AppConfig;
use joinvapor_store::storage::ProofStorage;
use joinvapor_store::store::PgStore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let store = PgStore::connect(&config).await.context("database unavailable")?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, order events will not be published");
                None
            }
        },
        None => None,
    };

    let state = AppState { store: Arc::new(store), storage: ProofStorage::new(&config.storage_dir), nats };
    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Join Vapor storefront listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
