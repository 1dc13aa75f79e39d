use moka::future::Cache;
use std::sync::Arc;
use tracing::debug;

use crate::config::ConsumerCacheConfig;
use crate::error::Result;
use crate::model::{ConsumerRateLimit, PolicyId};
use crate::repository::GatewayRepository;

/// Read-through cache of per-consumer rate limits.
///
/// Absence is cached as well (`None`), under the same TTL, so consumers without
/// a limit cost one database read per TTL instead of one per request.
pub struct ConsumerRateLimitCache {
    repository: Arc<dyn GatewayRepository>,
    entries: Cache<String, Option<ConsumerRateLimit>>,
}

impl ConsumerRateLimitCache {
    pub fn new(repository: Arc<dyn GatewayRepository>, config: &ConsumerCacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_size)
            .time_to_live(config.ttl())
            .build();
        Self { repository, entries }
    }

    /// Errors are not cached; the next call tries the database again.
    pub async fn get(&self, consumer_id: &str) -> Result<Option<ConsumerRateLimit>> {
        if let Some(cached) = self.entries.get(consumer_id).await {
            return Ok(cached);
        }

        let loaded = self.repository.find_consumer_rate_limit(consumer_id).await?;
        debug!(consumer_id, found = loaded.is_some(), "consumer rate limit loaded");
        self.entries.insert(consumer_id.to_string(), loaded.clone()).await;
        Ok(loaded)
    }

    pub async fn invalidate(&self, consumer_id: &str) {
        self.entries.invalidate(consumer_id).await;
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    /// Drop every consumer whose cached limit is backed by `policy_id`, and
    /// every cached absence: the policy may have just been attached to one of
    /// those consumers.
    pub async fn invalidate_policy(&self, policy_id: PolicyId) -> usize {
        let stale: Vec<Arc<String>> = self
            .entries
            .iter()
            .filter(|(_, limit)| limit.as_ref().map_or(true, |l| l.id == policy_id))
            .map(|(consumer_id, _)| consumer_id)
            .collect();

        for consumer_id in &stale {
            self.entries.invalidate(consumer_id.as_str()).await;
        }
        stale.len()
    }
}
