use serde::Deserialize;
use std::time::Duration;

/// Redis coordination store configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RedisConfig {
    /// Connection URL
    /// Default: "redis://127.0.0.1:6379"
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Prefix of every bucket key: `{prefix}:{scope}:{client}`
    /// Default: "rate_limit"
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Idle buckets expire after this many seconds
    /// Default: 120
    #[serde(default = "default_bucket_ttl")]
    pub bucket_ttl_secs: u64,
    /// Deadline of a single store call in milliseconds
    /// Default: 5000
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Deadline of a whole check, retries and backoff included, in milliseconds
    /// Default: 5000
    #[serde(default = "default_timeout_ms")]
    pub check_timeout_ms: u64,
    /// Retries after the first attempt, transient errors only
    /// Default: 3
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff between retries, doubled on each retry
    /// Default: 1000
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl RedisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
            bucket_ttl_secs: default_bucket_ttl(),
            timeout_ms: default_timeout_ms(),
            check_timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct RateLimitConfig {
    /// Local fallback used while the coordination store is unreachable
    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// Local fallback configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FallbackConfig {
    /// Enable the local token bucket fallback
    /// When false, requests are let through (fail-open) while the store is down
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Factor applied to rate and burst while degraded, in (0, 1]
    /// Default: 0.5
    #[serde(default = "default_reduction_factor")]
    pub reduction_factor: f64,
    /// Idle local buckets are evicted after this many seconds
    /// Default: 60
    #[serde(default = "default_fallback_ttl")]
    pub cache_ttl_secs: u64,
    /// Upper bound on local buckets kept in memory
    /// Default: 100000
    #[serde(default = "default_fallback_max_entries")]
    pub max_entries: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reduction_factor: default_reduction_factor(),
            cache_ttl_secs: default_fallback_ttl(),
            max_entries: default_fallback_max_entries(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    "rate_limit".to_string()
}

fn default_bucket_ttl() -> u64 {
    120
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_reduction_factor() -> f64 {
    0.5
}

fn default_fallback_ttl() -> u64 {
    60
}

fn default_fallback_max_entries() -> u64 {
    100_000
}
