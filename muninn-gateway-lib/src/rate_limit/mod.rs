//! Rate limiting for the gateway data plane.
//!
//! Decisions are made by a token bucket that normally lives in the shared
//! coordination store, so every gateway instance draws from the same budget.
//! When the store cannot be reached the [`RateLimitService`] degrades to a
//! local, more conservative bucket and switches back as soon as a store call
//! succeeds again.
//!
//! # Architecture
//!
//! 1. **bucket** (`bucket.rs`): the refill/take arithmetic, pure and shared.
//! 2. **table** (`table.rs`): lock-free per-key bucket states, CAS updated.
//! 3. **local** (`local.rs`): the fallback bucket with its reduction factor.
//! 4. **service** (`service.rs`): remote-first dispatch and degradation state.
//!
//! # Example Usage
//!
//! ```ignore
//! let result = service
//!     .check_rate_limit(&BucketScope::Route(route_id), "203.0.113.7", RateLimit::new(10, 20))
//!     .await;
//! if result.is_limited() {
//!     // 429 with result.headers()
//! }
//! ```

pub mod bucket;
mod key;
mod local;
mod result;
mod service;
mod table;

pub use bucket::{take_token, BucketOutcome, TokenBucketState};
pub use key::{bucket_key, BucketScope};
pub use local::LocalTokenBucket;
pub use result::{LimitScope, RateLimitCheckResult};
pub use service::RateLimitService;
pub use table::BucketTable;
