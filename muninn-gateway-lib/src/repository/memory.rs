use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use super::GatewayRepository;
use crate::error::{GatewayError, Result};
use crate::model::{ConsumerRateLimit, PolicyId, RateLimitPolicy, Route};

/// Number of reads served, per query.
#[derive(Debug, Default)]
pub struct RepositoryCalls {
    pub published_routes: AtomicUsize,
    pub consumer_rate_limit: AtomicUsize,
    pub policies_by_ids: AtomicUsize,
}

/// Repository kept in process memory.
///
/// Holds whatever it is given; `find_published_routes` applies the same status
/// filter as the database query. Can be told to fail, to exercise the paths
/// that must survive an unavailable database.
#[derive(Default)]
pub struct InMemoryRepository {
    routes: RwLock<Vec<Route>>,
    consumers: RwLock<HashMap<String, ConsumerRateLimit>>,
    policies: RwLock<HashMap<PolicyId, RateLimitPolicy>>,
    failing: AtomicBool,
    calls: RepositoryCalls,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_routes(&self, routes: Vec<Route>) {
        if let Ok(mut guard) = self.routes.write() {
            *guard = routes;
        }
    }

    pub fn put_consumer(&self, limit: ConsumerRateLimit) {
        if let Ok(mut guard) = self.consumers.write() {
            guard.insert(limit.consumer_id.clone(), limit);
        }
    }

    pub fn remove_consumer(&self, consumer_id: &str) {
        if let Ok(mut guard) = self.consumers.write() {
            guard.remove(consumer_id);
        }
    }

    pub fn put_policy(&self, policy: RateLimitPolicy) {
        if let Ok(mut guard) = self.policies.write() {
            guard.insert(policy.id, policy);
        }
    }

    pub fn remove_policy(&self, id: &PolicyId) {
        if let Ok(mut guard) = self.policies.write() {
            guard.remove(id);
        }
    }

    /// Make every read fail until called again with `false`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> &RepositoryCalls {
        &self.calls
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn poisoned() -> GatewayError {
    GatewayError::Database(sqlx::Error::Protocol("in-memory repository lock poisoned".into()))
}

#[async_trait]
impl GatewayRepository for InMemoryRepository {
    async fn find_published_routes(&self) -> Result<Vec<Route>> {
        self.calls.published_routes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let routes = self.routes.read().map_err(|_| poisoned())?;
        Ok(routes.iter().filter(|r| r.is_published()).cloned().collect())
    }

    async fn find_consumer_rate_limit(&self, consumer_id: &str) -> Result<Option<ConsumerRateLimit>> {
        self.calls.consumer_rate_limit.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let consumers = self.consumers.read().map_err(|_| poisoned())?;
        Ok(consumers.get(consumer_id).cloned())
    }

    async fn find_rate_limit_policies_by_ids(&self, ids: &[PolicyId]) -> Result<Vec<RateLimitPolicy>> {
        self.calls.policies_by_ids.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let policies = self.policies.read().map_err(|_| poisoned())?;
        Ok(ids.iter().filter_map(|id| policies.get(id).cloned()).collect())
    }
}
