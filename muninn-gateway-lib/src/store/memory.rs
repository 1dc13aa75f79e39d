use async_trait::async_trait;
use std::time::Duration;

use super::{BucketReply, BucketRequest, CoordinationStore};
use crate::error::StoreError;
use crate::rate_limit::BucketTable;

/// Process-local coordination store.
///
/// Has no server-side scripting; atomicity comes from the compare-and-swap
/// loop of [`BucketTable`]. Only coordinates tasks within one process, which is
/// enough for single-instance deployments and tests.
pub struct InMemoryCoordinationStore {
    table: BucketTable,
}

impl InMemoryCoordinationStore {
    pub fn new(idle_ttl: Duration, max_entries: u64) -> Self {
        Self { table: BucketTable::new(idle_ttl, max_entries) }
    }
}

impl Default for InMemoryCoordinationStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(120), 100_000)
    }
}

#[async_trait]
impl CoordinationStore for InMemoryCoordinationStore {
    async fn take_token(
        &self,
        request: &BucketRequest,
        now_ms: u64,
    ) -> Result<BucketReply, StoreError> {
        let outcome = self.table.take(&request.key, request.limit, now_ms);
        Ok(BucketReply {
            allowed: outcome.allowed,
            remaining: outcome.remaining,
            reset_time_ms: outcome.reset_time_ms,
        })
    }
}
