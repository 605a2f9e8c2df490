//! Shared availability grid server
//! REST API over per-calendar slot selections, persisted as one JSON snapshot

mod api;
mod config;
mod storage;

use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::storage::SlotStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("slot_server=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::parse();
    info!("Starting slot server...");

    let store = Arc::new(SlotStore::open(&config.data_dir)?);
    info!(
        "Storage initialized at: {} ({} calendars)",
        store.snapshot_path().display(),
        store.calendar_count()
    );

    if let Some(dir) = &config.static_dir {
        info!("Serving web client from: {}", dir.display());
    }
    let app = api::router(store, config.static_dir.as_deref());

    let addr = config.bind_addr()?;
    info!("Slot server listening on http://{}", addr);
    info!("API endpoints:");
    info!("  GET    /api/slots/:calendar_id       - Slots of a calendar");
    info!("  GET    /api/slots/:calendar_id/all   - Slots of a calendar");
    info!("  POST   /api/slots/:calendar_id       - Add/remove a nickname");
    info!("  DELETE /api/slots                    - Clear every calendar");
    info!("  GET    /api/timezone/:calendar_id    - Shared timezone");
    info!("  POST   /api/timezone/:calendar_id    - Set shared timezone");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Slot server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
