// PIN Pool - Web Server
// REST API with Axum

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use pin_pool::api::router;
use pin_pool::config::{ServerArgs, ServerConfig};
use pin_pool::telemetry::init_tracing;
use pin_pool::{PinService, PinStore, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = ServerArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_tracing()?;

    let store: Arc<dyn PinStore> = Arc::new(
        config
            .service
            .open_store()
            .context("Failed to open PIN database")?,
    );
    info!(store = ?config.service.store, "PIN store opened");

    let service = Arc::new(PinService::with_limits(store, config.service.limits));
    info!(
        version = VERSION,
        max_request = service.limits().max_request,
        max_rollovers = service.limits().max_rollovers,
        "PIN service ready"
    );

    if config.auto_initialize {
        let svc = service.clone();
        let ready = tokio::task::spawn_blocking(move || svc.initialize()).await??;
        if !ready {
            warn!("PIN pool could not be initialized at startup");
        }
    }

    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server_addr))?;

    info!("Server running on http://{}", config.server_addr);
    info!("   Initialize: GET /pin/initialize");
    info!("   Issue PINs: GET /pin/get-pins/{{requested}}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}
