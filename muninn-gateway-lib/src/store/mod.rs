//! The shared coordination store that holds distributed token buckets.

mod client;
mod memory;
mod redis_store;

pub use redis_store::{RedisCoordinationStore, TOKEN_BUCKET_SCRIPT};
pub use client::{RetryPolicy, StoreClient};
pub use memory::InMemoryCoordinationStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::RateLimit;

/// One token-bucket evaluation to run atomically in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRequest {
    pub key: String,
    pub limit: RateLimit,
    /// Idle buckets expire after this many seconds
    pub ttl_secs: u64,
}

/// `(allowed, remaining, reset_time_ms)` as returned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketReply {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_time_ms: u64,
}

/// A store able to evaluate a token bucket in a single atomic round trip.
///
/// Implementations must classify every failure into a
/// [`StoreErrorKind`](crate::error::StoreErrorKind); retries and timeouts are
/// applied on top by [`StoreClient`].
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn take_token(
        &self,
        request: &BucketRequest,
        now_ms: u64,
    ) -> Result<BucketReply, StoreError>;
}
