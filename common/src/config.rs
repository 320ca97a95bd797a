//! Service configuration, loaded from environment variables with
//! sane local-dev defaults. Mirrors the teacher's
//! `services-common::config` pattern of a plain struct with a
//! `Default` impl, scaled down to this platform's needs.

use serde::{Deserialize, Serialize};

/// Connection + durability parameters for the bus adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Directory the bus's durable per-exchange append logs live in.
    pub durable_log_dir: String,
    /// Per-consumer prefetch; the spec fixes this at 1.
    pub prefetch: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            durable_log_dir: "./data/bus".to_string(),
            prefetch: 1,
        }
    }
}

impl BusConfig {
    /// Load from `FORGEMESH_BUS_*` environment variables, falling back
    /// to defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(dir) = std::env::var("FORGEMESH_BUS_LOG_DIR") {
            cfg.durable_log_dir = dir;
        }
        cfg
    }
}

/// Storage configuration shared by participants that persist state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite connection string, e.g. `sqlite://./data/payment.db`.
    pub database_url: String,
}

impl StorageConfig {
    /// Load `database_url` from an environment variable, falling back
    /// to an in-memory database so services are runnable with zero
    /// setup.
    #[must_use]
    pub fn from_env(var: &str, default_path: &str) -> Self {
        let database_url =
            std::env::var(var).unwrap_or_else(|_| format!("sqlite://{default_path}"));
        Self { database_url }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_config_defaults() {
        let cfg = BusConfig::default();
        assert_eq!(cfg.prefetch, 1);
    }
}
