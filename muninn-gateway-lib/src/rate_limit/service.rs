use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::key::{bucket_key, BucketScope};
use super::local::LocalTokenBucket;
use super::RateLimitCheckResult;
use crate::clock::Clock;
use crate::config::{FallbackConfig, RedisConfig};
use crate::error::{StoreError, StoreErrorKind};
use crate::model::RateLimit;
use crate::store::{BucketRequest, StoreClient};
use crate::telemetry::metrics::{values, Metrics};

/// Remote-first rate limiting with a local fallback.
///
/// Every check goes to the coordination store. A failed call flips the
/// service into fallback mode and the decision is taken by the
/// [`LocalTokenBucket`] instead (or the request is let through, when the
/// fallback is disabled). The first successful store call flips it back.
/// While in fallback mode each check makes a single store attempt without
/// retries, so an outage costs at most one attempt timeout per request.
///
/// The mode is one atomic flag; transitions are compare-and-set so the
/// "degraded" and "recovered" log lines fire once per transition no matter how
/// many requests race through it.
pub struct RateLimitService {
    store: StoreClient,
    local: LocalTokenBucket,
    key_prefix: String,
    bucket_ttl_secs: u64,
    fallback_enabled: bool,
    using_fallback: AtomicBool,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<Metrics>>,
}

impl RateLimitService {
    pub fn new(
        store: StoreClient,
        redis: &RedisConfig,
        fallback: &FallbackConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            local: LocalTokenBucket::new(fallback, clock.clone()),
            key_prefix: redis.key_prefix.clone(),
            bucket_ttl_secs: redis.bucket_ttl_secs,
            fallback_enabled: fallback.enabled,
            using_fallback: AtomicBool::new(false),
            clock,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Take one token from the bucket of `client_key` within `scope`.
    ///
    /// Never fails: store errors are absorbed by the fallback path.
    pub async fn check_rate_limit(
        &self,
        scope: &BucketScope,
        client_key: &str,
        limit: RateLimit,
    ) -> RateLimitCheckResult {
        let key = bucket_key(&self.key_prefix, scope, client_key);
        let request = BucketRequest { key, limit, ttl_secs: self.bucket_ttl_secs };

        let reply = if self.is_using_fallback() {
            self.store.take_token_once(&request).await
        } else {
            self.store.take_token(&request).await
        };

        let (result, mode) = match reply {
            Ok(reply) => {
                self.mark_recovered();
                let result = RateLimitCheckResult {
                    allowed: reply.allowed,
                    remaining: reply.remaining,
                    reset_time_ms: reply.reset_time_ms,
                    scope: Some(scope.kind()),
                    limit: limit.burst_size,
                };
                (result, values::MODE_DISTRIBUTED)
            }
            Err(err) => {
                self.mark_degraded(&err);
                if self.fallback_enabled {
                    let result = self.local.check(&request.key, limit, Some(scope.kind()));
                    (result, values::MODE_LOCAL)
                } else {
                    let result = RateLimitCheckResult {
                        allowed: true,
                        remaining: u64::from(limit.burst_size),
                        reset_time_ms: self.clock.now_millis(),
                        scope: Some(scope.kind()),
                        limit: limit.burst_size,
                    };
                    (result, values::MODE_FAIL_OPEN)
                }
            }
        };

        if !result.allowed {
            debug!(key = %request.key, mode, remaining = result.remaining, "rate limit exceeded");
        }
        if let Some(m) = &self.metrics {
            m.record_rate_limit_decision(result.allowed, scope.kind().as_str(), mode);
        }

        result
    }

    /// True while decisions are taken without the coordination store.
    pub fn is_using_fallback(&self) -> bool {
        self.using_fallback.load(Ordering::Acquire)
    }

    /// The limit the local fallback enforces for `limit`.
    pub fn fallback_limit(&self, limit: RateLimit) -> RateLimit {
        self.local.effective_limit(limit)
    }

    pub fn local_bucket_count(&self) -> u64 {
        self.local.bucket_count()
    }

    fn mark_degraded(&self, err: &StoreError) {
        if self
            .using_fallback
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(error = %err, "coordination store still unavailable");
            return;
        }

        let reason = match err.kind() {
            StoreErrorKind::Timeout => "coordination store timed out",
            StoreErrorKind::Connection => "coordination store unreachable",
            StoreErrorKind::Protocol => "coordination store returned an unexpected reply",
        };
        if self.fallback_enabled {
            warn!(error = %err, "{reason}, switching to local rate limiting");
        } else {
            warn!(error = %err, "{reason}, local fallback disabled, allowing requests");
        }
        if let Some(m) = &self.metrics {
            m.record_fallback_transition(values::TRANSITION_DEGRADED);
        }
    }

    fn mark_recovered(&self) {
        if !self.using_fallback.load(Ordering::Acquire) {
            return;
        }
        if self
            .using_fallback
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!("coordination store reachable again, resuming distributed rate limiting");
            if let Some(m) = &self.metrics {
                m.record_fallback_transition(values::TRANSITION_RECOVERED);
            }
        }
    }
}
