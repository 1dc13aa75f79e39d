//! Per-request admission: route lookup followed by the route and consumer
//! rate limit checks.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{ConsumerRateLimitCache, PolicyCache};
use crate::clock::Clock;
use crate::model::RateLimit;
use crate::rate_limit::{BucketScope, RateLimitCheckResult, RateLimitService};
use crate::routing::{RouteDefinition, RouteLocator};

/// Outcome of [`RequestGate::check_request`].
#[derive(Debug, Clone)]
pub enum GateDecision {
    /// No published route matches the request
    NoRoute,
    /// Forward to `route.upstream`
    Allowed { route: Arc<RouteDefinition>, rate_limit: RateLimitCheckResult },
    /// Reject with 429
    Limited { route: Arc<RouteDefinition>, rate_limit: RateLimitCheckResult },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed { .. })
    }

    pub fn route(&self) -> Option<&Arc<RouteDefinition>> {
        match self {
            GateDecision::NoRoute => None,
            GateDecision::Allowed { route, .. } | GateDecision::Limited { route, .. } => Some(route),
        }
    }

    pub fn rate_limit(&self) -> Option<&RateLimitCheckResult> {
        match self {
            GateDecision::NoRoute => None,
            GateDecision::Allowed { rate_limit, .. } | GateDecision::Limited { rate_limit, .. } => {
                Some(rate_limit)
            }
        }
    }

    /// Upstream base URL of the matched route.
    pub fn upstream_url(&self) -> Option<String> {
        self.route().map(|r| r.upstream.to_string())
    }
}

pub struct RequestGate {
    locator: Arc<RouteLocator>,
    policies: Arc<PolicyCache>,
    consumers: Arc<ConsumerRateLimitCache>,
    rate_limits: Arc<RateLimitService>,
    clock: Arc<dyn Clock>,
}

impl RequestGate {
    pub fn new(
        locator: Arc<RouteLocator>,
        policies: Arc<PolicyCache>,
        consumers: Arc<ConsumerRateLimitCache>,
        rate_limits: Arc<RateLimitService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { locator, policies, consumers, rate_limits, clock }
    }

    /// Decide whether one request may be forwarded.
    ///
    /// The route policy is checked first and a denial there skips the consumer
    /// bucket entirely. When both allow, the result with the smaller remaining
    /// budget is reported. A policy or consumer limit that cannot be loaded is
    /// treated as absent.
    pub async fn check_request(
        &self,
        path: &str,
        method: &str,
        consumer_id: Option<&str>,
        client_key: &str,
    ) -> GateDecision {
        let Some(route) = self.locator.locate(path, method) else {
            debug!(path, method, "no route matched");
            return GateDecision::NoRoute;
        };

        let mut decision: Option<RateLimitCheckResult> = None;

        if let Some(limit) = self.route_limit(&route).await {
            let result = self
                .rate_limits
                .check_rate_limit(&BucketScope::Route(route.id), client_key, limit)
                .await;
            if result.is_limited() {
                return GateDecision::Limited { route, rate_limit: result };
            }
            decision = Some(result);
        }

        if let Some(consumer_id) = consumer_id {
            if let Some(limit) = self.consumer_limit(consumer_id).await {
                let result = self
                    .rate_limits
                    .check_rate_limit(&BucketScope::Consumer, consumer_id, limit)
                    .await;
                if result.is_limited() {
                    return GateDecision::Limited { route, rate_limit: result };
                }
                decision = Some(match decision {
                    Some(route_result) if route_result.remaining <= result.remaining => route_result,
                    _ => result,
                });
            }
        }

        let rate_limit = decision.unwrap_or_else(|| RateLimitCheckResult::unlimited(self.clock.now_millis()));
        GateDecision::Allowed { route, rate_limit }
    }

    async fn route_limit(&self, route: &RouteDefinition) -> Option<RateLimit> {
        let policy_id = route.rate_limit_policy_id?;
        match self.policies.get(policy_id).await {
            Ok(Some(policy)) => Some(policy.limit),
            Ok(None) => {
                debug!(route_id = %route.id, %policy_id, "route references an unknown policy");
                None
            }
            Err(e) => {
                warn!(route_id = %route.id, %policy_id, error = %e, "route policy unavailable, skipping route limit");
                None
            }
        }
    }

    async fn consumer_limit(&self, consumer_id: &str) -> Option<RateLimit> {
        match self.consumers.get(consumer_id).await {
            Ok(found) => found.map(|c| c.limit),
            Err(e) => {
                warn!(consumer_id, error = %e, "consumer limit unavailable, skipping consumer limit");
                None
            }
        }
    }
}
