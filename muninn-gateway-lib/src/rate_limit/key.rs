use std::fmt;

use crate::model::RouteId;

/// Namespace of a bucket, so route and consumer budgets never share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketScope {
    Route(RouteId),
    Consumer,
}

impl BucketScope {
    pub fn kind(&self) -> super::LimitScope {
        match self {
            BucketScope::Route(_) => super::LimitScope::Route,
            BucketScope::Consumer => super::LimitScope::Consumer,
        }
    }
}

impl fmt::Display for BucketScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketScope::Route(id) => write!(f, "route:{id}"),
            BucketScope::Consumer => f.write_str("consumer"),
        }
    }
}

/// `{prefix}:{scope}:{client_key}`
pub fn bucket_key(prefix: &str, scope: &BucketScope, client_key: &str) -> String {
    format!("{prefix}:{scope}:{client_key}")
}
