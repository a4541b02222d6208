//! Web server and API endpoints.
//!
//! Every request runs as its own tokio task and only ever reads the frame
//! buffer through the snapshotter, so nothing here can block or signal the
//! capture loop.

pub mod config;
pub mod handlers;
pub mod router;

// Re-export commonly used items
pub use config::WebConfig;
pub use handlers::AppState;
pub use router::create_app;

use crate::error::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Start the web server and serve until a shutdown signal arrives.
pub async fn start_web_server(config: WebConfig, state: Arc<AppState>) -> Result<()> {
    let app = create_app(&config, state);

    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| Error::config_error(format!("invalid bind address: {}", e)))?;

    info!("starting web server on http://{}", addr);
    info!("  status page:   http://{}/", addr);
    info!("  snapshot:      http://{}/camera/current.jpg", addr);
    info!("  camera API:    http://{}/api/camera/", addr);
    info!("  CPU API:       http://{}/api/cpu/", addr);
    info!("  climate API:   http://{}/api/temperatureandhumidity", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::web_server_error(format!("failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::web_server_error(format!("server error: {}", e)))?;

    Ok(())
}

/// Resolves when the process receives ctrl-c / SIGINT.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown signal handler");
        // Without a signal handler the server would be unstoppable;
        // returning here shuts it down instead.
    }
    info!("shutdown signal received");
}
