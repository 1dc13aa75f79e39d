//! Token bucket arithmetic shared by every bucket implementation.
//!
//! The Lua script of [`crate::store::RedisCoordinationStore`] performs exactly the same steps
//! server-side; keep the two in sync.

use crate::model::RateLimit;

/// Persisted state of one bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketState {
    /// Fractional tokens, always within `0..=capacity`
    pub tokens: f64,
    /// Epoch milliseconds of the last refill
    pub last_refill_ms: u64,
}

impl TokenBucketState {
    /// A bucket seen for the first time starts full.
    pub fn full(limit: RateLimit, now_ms: u64) -> Self {
        Self { tokens: f64::from(limit.burst_size), last_refill_ms: now_ms }
    }
}

/// Outcome of taking one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketOutcome {
    pub allowed: bool,
    /// Whole tokens left after this call
    pub remaining: u64,
    /// Epoch milliseconds at which the bucket is full again
    pub reset_time_ms: u64,
}

/// Refill `state` up to `now_ms`, then try to take one token.
///
/// Returns the state to persist and the decision. A missing state is a full
/// bucket. Clock skew (a `now_ms` older than the last refill) refills nothing
/// and never moves the refill timestamp backwards.
pub fn take_token(
    state: Option<TokenBucketState>,
    limit: RateLimit,
    now_ms: u64,
) -> (TokenBucketState, BucketOutcome) {
    let capacity = f64::from(limit.burst_size);
    let rate = f64::from(limit.requests_per_second.max(1));
    let state = state.unwrap_or_else(|| TokenBucketState::full(limit, now_ms));

    let elapsed_secs = now_ms.saturating_sub(state.last_refill_ms) as f64 / 1000.0;
    let mut tokens = (state.tokens + elapsed_secs * rate).min(capacity);

    let allowed = tokens >= 1.0;
    if allowed {
        tokens -= 1.0;
    }

    let reset_time_ms = if tokens < capacity {
        let secs_to_full = ((capacity - tokens) / rate).ceil() as u64;
        now_ms.saturating_add(secs_to_full.saturating_mul(1000))
    } else {
        now_ms
    };

    let next = TokenBucketState { tokens, last_refill_ms: now_ms.max(state.last_refill_ms) };
    let outcome = BucketOutcome { allowed, remaining: tokens.floor() as u64, reset_time_ms };
    (next, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: RateLimit = RateLimit { requests_per_second: 10, burst_size: 20 };

    #[test]
    fn new_bucket_starts_full_and_takes_one() {
        let (state, outcome) = take_token(None, LIMIT, 1_000);
        assert!(outcome.allowed);
        assert_eq!(outcome.remaining, 19);
        assert_eq!(state.tokens, 19.0);
        // one token missing at 10/s → ceil(0.1) = 1 second
        assert_eq!(outcome.reset_time_ms, 2_000);
    }

    #[test]
    fn empty_bucket_denies_without_going_negative() {
        let empty = TokenBucketState { tokens: 0.4, last_refill_ms: 5_000 };
        let (state, outcome) = take_token(Some(empty), LIMIT, 5_000);
        assert!(!outcome.allowed);
        assert_eq!(outcome.remaining, 0);
        assert_eq!(state.tokens, 0.4);
        assert_eq!(outcome.reset_time_ms, 5_000 + 2_000);
    }

    #[test]
    fn refill_is_capped_at_capacity() {
        let drained = TokenBucketState { tokens: 0.0, last_refill_ms: 0 };
        let (state, outcome) = take_token(Some(drained), LIMIT, 3_600_000);
        assert!(outcome.allowed);
        assert_eq!(state.tokens, 19.0);
    }

    #[test]
    fn full_bucket_after_denial_resets_now() {
        let limit = RateLimit::new(1, 1);
        let full = TokenBucketState { tokens: 1.0, last_refill_ms: 0 };
        let (state, _) = take_token(Some(full), limit, 0);
        assert_eq!(state.tokens, 0.0);
        let (state, outcome) = take_token(Some(state), limit, 0);
        assert!(!outcome.allowed);
        assert_eq!(state.tokens, 0.0);
        assert_eq!(outcome.reset_time_ms, 1_000);
    }

    #[test]
    fn clock_going_backwards_refills_nothing() {
        let state = TokenBucketState { tokens: 0.0, last_refill_ms: 10_000 };
        let (_, outcome) = take_token(Some(state), LIMIT, 9_000);
        assert!(!outcome.allowed);
    }

    #[test]
    fn late_caller_does_not_rewind_refill_time() {
        let state = TokenBucketState { tokens: 5.0, last_refill_ms: 10_000 };
        let (state, outcome) = take_token(Some(state), LIMIT, 9_000);
        assert!(outcome.allowed);
        assert_eq!(state.last_refill_ms, 10_000);

        // 100ms at 10/s is one token; the skipped second must not count again
        let (state, _) = take_token(Some(state), LIMIT, 10_100);
        assert_eq!(state.tokens, 4.0);
    }
}
