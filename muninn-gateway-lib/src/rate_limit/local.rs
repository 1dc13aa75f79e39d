use std::sync::Arc;
use std::time::Duration;

use super::table::BucketTable;
use super::{LimitScope, RateLimitCheckResult};
use crate::clock::Clock;
use crate::config::FallbackConfig;
use crate::model::RateLimit;

/// In-process token bucket used while the coordination store is unreachable.
///
/// Every limit is scaled down by the reduction factor before use, so a fleet of
/// gateways that lost coordination stays closer to the intended global budget.
pub struct LocalTokenBucket {
    table: BucketTable,
    reduction_factor: f64,
    clock: Arc<dyn Clock>,
}

impl LocalTokenBucket {
    pub fn new(config: &FallbackConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            table: BucketTable::new(Duration::from_secs(config.cache_ttl_secs), config.max_entries),
            reduction_factor: config.reduction_factor,
            clock,
        }
    }

    /// The limit actually enforced locally for a configured `limit`.
    pub fn effective_limit(&self, limit: RateLimit) -> RateLimit {
        limit.reduced(self.reduction_factor)
    }

    pub fn check(
        &self,
        key: &str,
        limit: RateLimit,
        scope: Option<LimitScope>,
    ) -> RateLimitCheckResult {
        let effective = self.effective_limit(limit);
        let outcome = self.table.take(key, effective, self.clock.now_millis());
        RateLimitCheckResult {
            allowed: outcome.allowed,
            remaining: outcome.remaining,
            reset_time_ms: outcome.reset_time_ms,
            scope,
            limit: effective.burst_size,
        }
    }

    pub fn bucket_count(&self) -> u64 {
        self.table.len()
    }
}
