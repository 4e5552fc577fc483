//! Crate-level configuration.
//!
//! Settings are layered: compiled defaults, then an optional `flowgate`
//! config file in the working directory, then environment variables with
//! the `FLOWGATE_` prefix (e.g. `FLOWGATE_DATABASE_URL`).

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{FlowgateError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowgateConfig {
    /// PostgreSQL connection string for the shared record store.
    pub database_url: String,
    /// Maximum connections held by the pool.
    pub max_pool_connections: u32,
    /// Upper bound on row-lock waits inside gate transactions, in
    /// milliseconds. Applied per-transaction via `SET LOCAL lock_timeout`.
    pub lock_wait_timeout_ms: u64,
    /// Maximum number of due delayed executions released per timer poll.
    pub timer_batch_size: i64,
}

impl Default for FlowgateConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/flowgate_development".to_string(),
            max_pool_connections: 10,
            lock_wait_timeout_ms: 5000,
            timer_batch_size: 100,
        }
    }
}

impl FlowgateConfig {
    /// Load configuration from defaults, optional file, and environment.
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&FlowgateConfig::default())
            .map_err(|e| FlowgateError::Configuration(format!("Invalid defaults: {e}")))?;

        Config::builder()
            .add_source(defaults)
            .add_source(File::with_name("flowgate").required(false))
            .add_source(Environment::with_prefix("FLOWGATE").try_parsing(true))
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| FlowgateError::Configuration(format!("Failed to load config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = FlowgateConfig::default();
        assert_eq!(config.max_pool_connections, 10);
        assert_eq!(config.lock_wait_timeout_ms, 5000);
        assert_eq!(config.timer_batch_size, 100);
        assert!(config.database_url.starts_with("postgresql://"));
    }

    #[test]
    fn test_load_uses_defaults_without_overrides() {
        let config = FlowgateConfig::load().expect("defaults should always load");
        assert_eq!(
            config.max_pool_connections,
            FlowgateConfig::default().max_pool_connections
        );
    }

    #[test]
    fn test_environment_override() {
        std::env::set_var("FLOWGATE_TIMER_BATCH_SIZE", "25");
        let config = FlowgateConfig::load().expect("config should load");
        assert_eq!(config.timer_batch_size, 25);
        std::env::remove_var("FLOWGATE_TIMER_BATCH_SIZE");
    }
}
