//! Termination signal handling.
//!
//! The returned future resolves on Ctrl+C or SIGTERM. Passed to
//! `axum::serve(..).with_graceful_shutdown`, it stops the listener while
//! in-flight requests (including their upstream calls) run to completion.

use tokio::signal;
use tracing::{info, warn};

/// Wait for a shutdown signal (SIGTERM or SIGINT).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully");
        }
        _ = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully");
        }
    }
}
