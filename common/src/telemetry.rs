//! Tracing bootstrap shared by every service binary.

use tracing_subscriber::EnvFilter;

/// Install a `tracing_subscriber` with an `RUST_LOG`-driven filter,
/// defaulting to `info` when unset. Safe to call once per process.
pub fn init_tracing(service: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
    tracing::info!(service, "tracing initialized");
}
