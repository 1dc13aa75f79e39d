use http::{Method, Uri};
use thiserror::Error;

use crate::model::{PolicyId, Route, RouteId};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LocatorError {
    #[error("route has no id")]
    MissingId,
    #[error("route path must start with '/': {0:?}")]
    InvalidPath(String),
    #[error("invalid upstream url {url:?}: {reason}")]
    InvalidUpstream { url: String, reason: String },
    #[error("invalid HTTP method: {0:?}")]
    InvalidMethod(String),
}

/// `true` iff `request_path` is `route_path` itself or lies below it.
///
/// `/api/orders` matches `/api/orders` and `/api/orders/123/items`, never
/// `/api/ordershistory`. The comparison is literal: a route `/` matches only
/// `/`, and a route `/api/orders/` matches only `/api/orders/` and paths below
/// `/api/orders//`.
pub fn path_matches(request_path: &str, route_path: &str) -> bool {
    match request_path.strip_prefix(route_path) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// A published route compiled into a request predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDefinition {
    pub id: RouteId,
    pub path: String,
    pub upstream: Uri,
    /// Empty means any method
    pub methods: Vec<Method>,
    pub rate_limit_policy_id: Option<PolicyId>,
}

impl RouteDefinition {
    pub fn from_route(route: &Route) -> Result<Self, LocatorError> {
        let id = route.id.ok_or(LocatorError::MissingId)?;

        if !route.path.starts_with('/') {
            return Err(LocatorError::InvalidPath(route.path.clone()));
        }

        let upstream: Uri = route.upstream_url.parse().map_err(|e: http::uri::InvalidUri| {
            LocatorError::InvalidUpstream { url: route.upstream_url.clone(), reason: e.to_string() }
        })?;
        if upstream.scheme().is_none() || upstream.authority().is_none() {
            return Err(LocatorError::InvalidUpstream {
                url: route.upstream_url.clone(),
                reason: "scheme and host are required".to_string(),
            });
        }

        let methods = route
            .methods
            .iter()
            .map(|m| {
                let upper = m.trim().to_ascii_uppercase();
                Method::from_bytes(upper.as_bytes())
                    .map_err(|_| LocatorError::InvalidMethod(m.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id,
            path: route.path.clone(),
            upstream,
            methods,
            rate_limit_policy_id: route.rate_limit_policy_id,
        })
    }

    /// Method check is case-insensitive.
    pub fn accepts_method(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|m| m.as_str().eq_ignore_ascii_case(method))
    }

    pub fn matches(&self, request_path: &str, method: &str) -> bool {
        path_matches(request_path, &self.path) && self.accepts_method(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matching_respects_segment_boundaries() {
        assert!(path_matches("/api/orders", "/api/orders"));
        assert!(path_matches("/api/orders/123", "/api/orders"));
        assert!(path_matches("/api/orders/123/items", "/api/orders"));
        assert!(!path_matches("/api/ordershistory", "/api/orders"));
        assert!(!path_matches("/api/ord", "/api/orders"));
    }

    #[test]
    fn trailing_slash_and_root_compare_literally() {
        assert!(path_matches("/", "/"));
        assert!(!path_matches("/anything/at/all", "/"));
        assert!(path_matches("/api/orders/", "/api/orders/"));
        assert!(!path_matches("/api/orders", "/api/orders/"));
        assert!(!path_matches("/api/orders/1", "/api/orders/"));
    }
}
