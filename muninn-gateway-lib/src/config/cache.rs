use serde::Deserialize;
use std::time::Duration;

/// Published route snapshot configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RouteCacheConfig {
    /// Lifetime of the secondary route cache, also the periodic refresh interval
    /// Default: 300
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// Maximum number of routes kept by the secondary cache
    /// Default: 10000
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    /// Refresh the snapshot every `ttl_secs` in addition to pub/sub invalidation
    /// Default: true
    #[serde(default = "default_true")]
    pub periodic_refresh: bool,
}

impl RouteCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for RouteCacheConfig {
    fn default() -> Self {
        Self { ttl_secs: default_ttl(), max_size: default_max_size(), periodic_refresh: true }
    }
}

/// Consumer rate limit cache configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ConsumerCacheConfig {
    /// Lifetime of both found and absent entries
    /// Default: 300
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// Maximum number of consumers kept
    /// Default: 10000
    #[serde(default = "default_max_size")]
    pub max_size: u64,
}

impl ConsumerCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for ConsumerCacheConfig {
    fn default() -> Self {
        Self { ttl_secs: default_ttl(), max_size: default_max_size() }
    }
}

fn default_true() -> bool {
    true
}

fn default_ttl() -> u64 {
    300
}

fn default_max_size() -> u64 {
    10_000
}
