use serde::Deserialize;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Postgres connection URL
    /// Default: "postgres://localhost/gateway"
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum pooled connections
    /// Default: 10
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a query waits for a pooled connection, in milliseconds
    /// Default: 5000
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

fn default_database_url() -> String {
    "postgres://localhost/gateway".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_ms() -> u64 {
    5000
}
