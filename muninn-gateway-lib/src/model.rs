//! Records read from the gateway database.
//!
//! The data plane never writes these; they are produced by the admin API and
//! only loaded here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type RouteId = Uuid;
pub type PolicyId = Uuid;

/// Publication state of a route. Only [`RouteStatus::Published`] routes are served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    Draft,
    Pending,
    Published,
    Rejected,
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouteStatus::Draft => "draft",
            RouteStatus::Pending => "pending",
            RouteStatus::Published => "published",
            RouteStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

impl FromStr for RouteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(RouteStatus::Draft),
            "pending" => Ok(RouteStatus::Pending),
            "published" => Ok(RouteStatus::Published),
            "rejected" => Ok(RouteStatus::Rejected),
            other => Err(format!("unknown route status: {other}")),
        }
    }
}

/// Route configuration for path-based routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Unset for rows that were never assigned an identity; such routes are skipped
    pub id: Option<RouteId>,
    /// URL path prefix to match (e.g. "/api/orders")
    pub path: String,
    /// Where matching requests are forwarded
    pub upstream_url: String,
    /// HTTP verbs this route accepts; empty means any
    #[serde(default)]
    pub methods: Vec<String>,
    pub status: RouteStatus,
    /// Route-level rate limit, resolved through the policy cache
    #[serde(default)]
    pub rate_limit_policy_id: Option<PolicyId>,
}

impl Route {
    pub fn is_published(&self) -> bool {
        self.status == RouteStatus::Published
    }
}

/// The two numbers a token bucket needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Refill rate, must be > 0
    pub requests_per_second: u32,
    /// Bucket capacity, >= requests_per_second
    pub burst_size: u32,
}

impl RateLimit {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self { requests_per_second, burst_size }
    }

    /// Scale both numbers down by `factor`, never below one request.
    pub fn reduced(&self, factor: f64) -> Self {
        Self {
            requests_per_second: reduce(self.requests_per_second, factor),
            burst_size: reduce(self.burst_size, factor),
        }
    }
}

fn reduce(value: u32, factor: f64) -> u32 {
    let scaled = (f64::from(value) * factor).floor();
    if scaled < 1.0 {
        1
    } else if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// Rate limit policy attached to routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub id: PolicyId,
    #[serde(flatten)]
    pub limit: RateLimit,
}

/// Rate limit applying to every request of one API consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRateLimit {
    /// Identity of the underlying policy, carried on the rate limit channel
    pub id: PolicyId,
    pub consumer_id: String,
    #[serde(flatten)]
    pub limit: RateLimit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduction_floors_and_never_drops_below_one() {
        let limit = RateLimit::new(10, 20);
        assert_eq!(limit.reduced(0.5), RateLimit::new(5, 10));
        assert_eq!(RateLimit::new(3, 3).reduced(0.5), RateLimit::new(1, 1));
        assert_eq!(RateLimit::new(1, 1).reduced(0.1), RateLimit::new(1, 1));
        assert_eq!(RateLimit::new(7, 15).reduced(1.0), RateLimit::new(7, 15));
    }

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!(RouteStatus::Published.to_string(), "published");
        assert_eq!("PENDING".parse::<RouteStatus>(), Ok(RouteStatus::Pending));
        assert!("archived".parse::<RouteStatus>().is_err());
    }
}
