mod cache;
mod coordination;
mod database;
mod invalidation;
mod loader;
mod root;
mod telemetry;

pub use cache::{ConsumerCacheConfig, RouteCacheConfig};
pub use coordination::{FallbackConfig, RateLimitConfig, RedisConfig};
pub use database::DatabaseConfig;
pub use invalidation::InvalidationConfig;
pub use loader::{load_from_path, load_from_str, validate};
pub use root::Config;
pub use telemetry::{LoggingConfig, TelemetryConfig};
