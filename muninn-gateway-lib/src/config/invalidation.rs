use serde::Deserialize;
use std::time::Duration;

/// Pub/sub invalidation configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct InvalidationConfig {
    /// Channel announcing that the published route set changed
    /// Default: "gateway:routes:invalidate"
    #[serde(default = "default_route_channel")]
    pub route_channel: String,
    /// Channel carrying one rate limit policy id per message
    /// Default: "gateway:rate-limits:invalidate"
    #[serde(default = "default_rate_limit_channel")]
    pub rate_limit_channel: String,
    /// Delay before a dropped subscription is re-established
    /// Default: 30
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

impl InvalidationConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            route_channel: default_route_channel(),
            rate_limit_channel: default_rate_limit_channel(),
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

fn default_route_channel() -> String {
    "gateway:routes:invalidate".to_string()
}

fn default_rate_limit_channel() -> String {
    "gateway:rate-limits:invalidate".to_string()
}

fn default_reconnect_delay() -> u64 {
    30
}
