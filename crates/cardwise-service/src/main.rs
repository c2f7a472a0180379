//! Cardwise service entry point.

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use cardwise_service::{create_router, AppState, ServiceConfig};
use cardwise_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cardwise_service=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env();
    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir.display(),
        "starting cardwise service"
    );

    if config.service_api_key.is_none() {
        tracing::warn!("CARDWISE_SERVICE_API_KEY not set - all /v1 routes will reject");
    }

    let store = Arc::new(RocksStore::open(&config.data_dir)?);
    let state = AppState::new(store, config.clone());
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router).await?;
    Ok(())
}
