//! Lock-free table of token buckets.
//!
//! Each key owns an [`ArcSwap`] holding an immutable [`TokenBucketState`]. A
//! check loads the current snapshot, computes the successor with
//! [`take_token`], and publishes it with a compare-and-swap. When another task
//! won the race the loop starts over from the newer snapshot, so no update is
//! ever lost and no task ever blocks on a lock.

use arc_swap::ArcSwap;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

use super::bucket::{take_token, BucketOutcome, TokenBucketState};
use crate::model::RateLimit;

type Slot = Arc<ArcSwap<TokenBucketState>>;

pub struct BucketTable {
    buckets: Cache<String, Slot, ahash::RandomState>,
}

impl BucketTable {
    /// Buckets not touched for `idle_ttl` are evicted; at most `max_entries` are kept.
    pub fn new(idle_ttl: Duration, max_entries: u64) -> Self {
        let buckets = Cache::builder()
            .max_capacity(max_entries)
            .time_to_idle(idle_ttl)
            .build_with_hasher(ahash::RandomState::new());
        Self { buckets }
    }

    pub fn take(&self, key: &str, limit: RateLimit, now_ms: u64) -> BucketOutcome {
        let slot = self.buckets.get_with_by_ref(key, || {
            Arc::new(ArcSwap::from_pointee(TokenBucketState::full(limit, now_ms)))
        });

        loop {
            let current = slot.load_full();
            let (next, outcome) = take_token(Some(*current), limit, now_ms);
            let previous = slot.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &current) {
                return outcome;
            }
        }
    }

    /// Current tokens of `key`, if the bucket exists.
    pub fn peek(&self, key: &str) -> Option<TokenBucketState> {
        self.buckets.get(key).map(|slot| **slot.load())
    }

    pub fn len(&self) -> u64 {
        self.buckets.run_pending_tasks();
        self.buckets.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
