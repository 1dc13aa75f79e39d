//! Read access to the gateway database.
//!
//! Writes happen in the admin API; the data plane only ever reads.

mod memory;
mod postgres;

pub use memory::{InMemoryRepository, RepositoryCalls};
pub use postgres::PgGatewayRepository;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ConsumerRateLimit, PolicyId, RateLimitPolicy, Route};

#[async_trait]
pub trait GatewayRepository: Send + Sync {
    /// Every route whose status is `published`.
    async fn find_published_routes(&self) -> Result<Vec<Route>>;

    /// The limit of one consumer, `None` when the consumer has none.
    async fn find_consumer_rate_limit(&self, consumer_id: &str) -> Result<Option<ConsumerRateLimit>>;

    /// Policies among `ids` that still exist; missing ids are simply absent.
    async fn find_rate_limit_policies_by_ids(&self, ids: &[PolicyId]) -> Result<Vec<RateLimitPolicy>>;
}
