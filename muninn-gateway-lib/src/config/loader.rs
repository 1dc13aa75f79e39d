use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{GatewayError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| GatewayError::Config(format!("Failed to read config file: {e}")))?;
    load_from_str(&txt)
}

pub fn load_from_str(txt: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(txt)
        .map_err(|e| GatewayError::Config(format!("Failed to parse config: {e}")))?;

    validate(&cfg).map_err(GatewayError::Config)?;

    Ok(cfg)
}

pub fn validate(cfg: &Config) -> std::result::Result<(), String> {
    if cfg.redis.url.trim().is_empty() {
        return Err("redis.url cannot be empty".into());
    }
    if cfg.redis.key_prefix.trim().is_empty() {
        return Err("redis.key_prefix cannot be empty".into());
    }
    if cfg.redis.bucket_ttl_secs == 0 {
        return Err("redis.bucket_ttl_secs must be > 0".into());
    }
    if cfg.redis.timeout_ms == 0 {
        return Err("redis.timeout_ms must be > 0".into());
    }
    if cfg.redis.check_timeout_ms == 0 {
        return Err("redis.check_timeout_ms must be > 0".into());
    }

    let factor = cfg.rate_limit.fallback.reduction_factor;
    if !(factor > 0.0 && factor <= 1.0) {
        return Err(format!(
            "rate_limit.fallback.reduction_factor must be in (0, 1], got {factor}"
        ));
    }
    if cfg.rate_limit.fallback.cache_ttl_secs == 0 {
        return Err("rate_limit.fallback.cache_ttl_secs must be > 0".into());
    }

    if cfg.route_cache.ttl_secs == 0 || cfg.consumer_cache.ttl_secs == 0 {
        return Err("cache ttl_secs must be > 0".into());
    }
    if cfg.route_cache.max_size == 0 || cfg.consumer_cache.max_size == 0 {
        return Err("cache max_size must be > 0".into());
    }

    let inv = &cfg.invalidation;
    if inv.route_channel.trim().is_empty() || inv.rate_limit_channel.trim().is_empty() {
        return Err("invalidation channel names cannot be empty".into());
    }
    if inv.route_channel == inv.rate_limit_channel {
        return Err(format!(
            "route and rate limit invalidation must use distinct channels, both are {:?}",
            inv.route_channel
        ));
    }
    if inv.reconnect_delay_secs == 0 {
        return Err("invalidation.reconnect_delay_secs must be > 0".into());
    }

    Ok(())
}
