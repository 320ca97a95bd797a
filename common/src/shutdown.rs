//! Cooperative shutdown signal shared by every service binary,
//! following the teacher's `risk-manager` main's ctrl-c/SIGTERM
//! `tokio::select!` pattern.

use tracing::{error, info};

/// Resolves once the process receives Ctrl+C or SIGTERM. Services stop
/// binding new consumers and let in-flight handlers drain (bounded by
/// prefetch=1) before exiting, per spec.md §5's cancellation policy.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!(%err, "failed to install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
