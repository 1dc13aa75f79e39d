use std::fmt;

/// Which policy produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitScope {
    Route,
    Consumer,
}

impl LimitScope {
    pub fn as_str(self) -> &'static str {
        match self {
            LimitScope::Route => "route",
            LimitScope::Consumer => "consumer",
        }
    }
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitCheckResult {
    pub allowed: bool,
    /// Whole tokens left in the bucket
    pub remaining: u64,
    /// Epoch milliseconds at which the bucket is full again
    pub reset_time_ms: u64,
    /// Policy that was checked; `None` when no policy applied
    pub scope: Option<LimitScope>,
    /// Bucket capacity that was enforced
    pub limit: u32,
}

impl RateLimitCheckResult {
    /// Decision for a request no policy applies to.
    pub fn unlimited(now_ms: u64) -> Self {
        Self { allowed: true, remaining: u64::MAX, reset_time_ms: now_ms, scope: None, limit: 0 }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn is_limited(&self) -> bool {
        !self.allowed
    }

    /// Seconds until the bucket is full again, rounded up.
    pub fn reset_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_time_ms.saturating_sub(now_ms).div_ceil(1000)
    }

    /// `x-ratelimit-*` response headers for the dispatch layer.
    ///
    /// Unlimited results produce no headers.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        if self.scope.is_none() {
            return Vec::new();
        }
        vec![
            ("x-ratelimit-limit", self.limit.to_string()),
            ("x-ratelimit-remaining", self.remaining.to_string()),
            ("x-ratelimit-reset", (self.reset_time_ms / 1000).to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_carry_limit_remaining_and_reset_seconds() {
        let result = RateLimitCheckResult {
            allowed: true,
            remaining: 4,
            reset_time_ms: 1_700_000_001_500,
            scope: Some(LimitScope::Route),
            limit: 20,
        };
        assert_eq!(
            result.headers(),
            vec![
                ("x-ratelimit-limit", "20".to_string()),
                ("x-ratelimit-remaining", "4".to_string()),
                ("x-ratelimit-reset", "1700000001".to_string()),
            ]
        );
        assert_eq!(result.reset_after_secs(1_700_000_000_000), 2);
    }

    #[test]
    fn unlimited_has_no_headers() {
        assert!(RateLimitCheckResult::unlimited(0).headers().is_empty());
    }
}
