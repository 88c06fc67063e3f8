//! Infermeter Service - credit-metered inference HTTP API
//!
//! This is the main entry point for the infermeter service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use infermeter_service::{create_router, AmqpDispatcher, AppState, ServiceConfig};
use infermeter_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,infermeter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Infermeter Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        amqp_url = %config.amqp_url,
        image_queue = %config.image_queue,
        scan3d_queue = %config.scan3d_queue,
        "Service configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&config.data_dir)?);

    // Connect to the message broker. Exhausting the bounded retry budget is
    // a fatal startup error, not a degraded mode.
    let dispatcher = Arc::new(
        AmqpDispatcher::connect(&config.amqp_url, config.dispatch_connect_attempts).await?,
    );

    // Build app state
    let state = AppState::new(store, dispatcher, config.clone());

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
