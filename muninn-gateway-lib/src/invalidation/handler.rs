use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{ConsumerRateLimitCache, PolicyCache, RouteCache};
use crate::error::{GatewayError, Result};

/// Reaction to one invalidation message.
///
/// [`GatewayError::MalformedPayload`] means the message was dropped; any other
/// error means the reload itself failed. Neither stops the subscription.
#[async_trait]
pub trait InvalidationHandler: Send + Sync {
    async fn handle(&self, payload: &str) -> Result<()>;
}

/// Route channel: any message reloads every published route.
pub struct RouteInvalidationHandler {
    routes: Arc<RouteCache>,
}

impl RouteInvalidationHandler {
    pub fn new(routes: Arc<RouteCache>) -> Self {
        Self { routes }
    }
}

#[async_trait]
impl InvalidationHandler for RouteInvalidationHandler {
    async fn handle(&self, payload: &str) -> Result<()> {
        debug!(payload, "route invalidation received");
        self.routes.refresh().await.map(|_| ())
    }
}

/// Rate limit channel: each message is the id of one policy to reload.
pub struct RateLimitInvalidationHandler {
    policies: Arc<PolicyCache>,
    consumers: Arc<ConsumerRateLimitCache>,
}

impl RateLimitInvalidationHandler {
    pub fn new(policies: Arc<PolicyCache>, consumers: Arc<ConsumerRateLimitCache>) -> Self {
        Self { policies, consumers }
    }
}

#[async_trait]
impl InvalidationHandler for RateLimitInvalidationHandler {
    async fn handle(&self, payload: &str) -> Result<()> {
        let id = Uuid::parse_str(payload.trim())
            .map_err(|e| GatewayError::MalformedPayload(format!("{payload:?} is not a policy id: {e}")))?;

        let evicted = self.consumers.invalidate_policy(id).await;
        self.policies.refresh(id).await?;
        info!(policy_id = %id, consumers_evicted = evicted, "rate limit policy invalidated");
        Ok(())
    }
}
