use serde::Deserialize;

use super::cache::{ConsumerCacheConfig, RouteCacheConfig};
use super::coordination::{RateLimitConfig, RedisConfig};
use super::database::DatabaseConfig;
use super::invalidation::InvalidationConfig;
use super::telemetry::{LoggingConfig, TelemetryConfig};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Coordination store (Redis) used for distributed buckets and pub/sub
    #[serde(default)]
    pub redis: RedisConfig,
    /// Database holding routes and rate limit policies (read-only access)
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Rate limiting behaviour, including the local fallback
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Published route snapshot settings
    #[serde(default)]
    pub route_cache: RouteCacheConfig,
    /// Per-consumer limit cache settings
    #[serde(default)]
    pub consumer_cache: ConsumerCacheConfig,
    /// Pub/sub invalidation channels
    #[serde(default)]
    pub invalidation: InvalidationConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
