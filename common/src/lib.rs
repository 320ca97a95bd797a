//! Shared types, configuration, and bootstrap helpers for every
//! Forgemesh service.

pub mod config;
pub mod money;
pub mod shutdown;
pub mod telemetry;

pub use config::{BusConfig, StorageConfig};
pub use money::{Money, PieceType};
pub use shutdown::shutdown_signal;
pub use telemetry::init_tracing;
