use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::Result;
use crate::model::{PolicyId, RateLimitPolicy};
use crate::repository::GatewayRepository;

/// Read-through cache of route rate limit policies, keyed by policy id.
///
/// Like the consumer cache, a policy that does not exist is remembered as
/// `None`. [`PolicyCache::refresh`] is the targeted invalidation driven by the
/// rate limit channel.
pub struct PolicyCache {
    repository: Arc<dyn GatewayRepository>,
    entries: Cache<PolicyId, Option<RateLimitPolicy>>,
}

impl PolicyCache {
    pub fn new(repository: Arc<dyn GatewayRepository>, ttl: Duration, max_size: u64) -> Self {
        let entries = Cache::builder().max_capacity(max_size).time_to_live(ttl).build();
        Self { repository, entries }
    }

    pub async fn get(&self, id: PolicyId) -> Result<Option<RateLimitPolicy>> {
        if let Some(cached) = self.entries.get(&id).await {
            return Ok(cached);
        }
        let loaded = self.load(id).await?;
        debug!(policy_id = %id, found = loaded.is_some(), "rate limit policy loaded");
        self.entries.insert(id, loaded.clone()).await;
        Ok(loaded)
    }

    /// Reload one policy from the database, replacing whatever was cached.
    ///
    /// On a database error the entry is evicted so the next read retries.
    pub async fn refresh(&self, id: PolicyId) -> Result<Option<RateLimitPolicy>> {
        match self.load(id).await {
            Ok(loaded) => {
                info!(policy_id = %id, found = loaded.is_some(), "rate limit policy refreshed");
                self.entries.insert(id, loaded.clone()).await;
                Ok(loaded)
            }
            Err(e) => {
                self.entries.invalidate(&id).await;
                Err(e)
            }
        }
    }

    pub async fn invalidate(&self, id: PolicyId) {
        self.entries.invalidate(&id).await;
    }

    async fn load(&self, id: PolicyId) -> Result<Option<RateLimitPolicy>> {
        let policies = self.repository.find_rate_limit_policies_by_ids(&[id]).await?;
        Ok(policies.into_iter().find(|p| p.id == id))
    }
}
