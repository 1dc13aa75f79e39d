use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::warn;
use uuid::Uuid;

use super::GatewayRepository;
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::model::{ConsumerRateLimit, PolicyId, RateLimit, RateLimitPolicy, Route, RouteStatus};

const PUBLISHED_ROUTES: &str = "SELECT id, path, upstream_url, methods, status, rate_limit_policy_id \
     FROM routes WHERE status = 'published' ORDER BY path";

const CONSUMER_RATE_LIMIT: &str = "SELECT id, consumer_id, requests_per_second, burst_size \
     FROM consumer_rate_limits WHERE consumer_id = $1";

const POLICIES_BY_IDS: &str = "SELECT id, requests_per_second, burst_size \
     FROM rate_limit_policies WHERE id = ANY($1)";

#[derive(FromRow)]
struct RouteRow {
    id: Option<Uuid>,
    path: String,
    upstream_url: String,
    methods: Option<Vec<String>>,
    status: String,
    rate_limit_policy_id: Option<Uuid>,
}

#[derive(FromRow)]
struct PolicyRow {
    id: Uuid,
    requests_per_second: i32,
    burst_size: i32,
}

#[derive(FromRow)]
struct ConsumerRow {
    id: Uuid,
    consumer_id: String,
    requests_per_second: i32,
    burst_size: i32,
}

/// Postgres-backed repository.
#[derive(Clone)]
pub struct PgGatewayRepository {
    pool: PgPool,
}

impl PgGatewayRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the pool without opening a connection; an unreachable database
    /// surfaces as a failed query instead of a startup error.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy(&config.url)?;
        Ok(Self::new(pool))
    }
}

/// Rejects rows the admin API should never have written (non-positive numbers).
fn rate_limit(id: Uuid, requests_per_second: i32, burst_size: i32) -> Option<RateLimit> {
    match (u32::try_from(requests_per_second), u32::try_from(burst_size)) {
        (Ok(rps), Ok(burst)) if rps > 0 && burst > 0 => Some(RateLimit::new(rps, burst)),
        _ => {
            warn!(%id, requests_per_second, burst_size, "ignoring invalid rate limit row");
            None
        }
    }
}

#[async_trait]
impl GatewayRepository for PgGatewayRepository {
    async fn find_published_routes(&self) -> Result<Vec<Route>> {
        let rows: Vec<RouteRow> = sqlx::query_as(PUBLISHED_ROUTES).fetch_all(&self.pool).await?;

        let routes = rows
            .into_iter()
            .filter_map(|row| {
                let status = match row.status.parse::<RouteStatus>() {
                    Ok(status) => status,
                    Err(e) => {
                        warn!(path = %row.path, error = %e, "skipping route with unknown status");
                        return None;
                    }
                };
                Some(Route {
                    id: row.id,
                    path: row.path,
                    upstream_url: row.upstream_url,
                    methods: row.methods.unwrap_or_default(),
                    status,
                    rate_limit_policy_id: row.rate_limit_policy_id,
                })
            })
            .collect();
        Ok(routes)
    }

    async fn find_consumer_rate_limit(&self, consumer_id: &str) -> Result<Option<ConsumerRateLimit>> {
        let row: Option<ConsumerRow> = sqlx::query_as(CONSUMER_RATE_LIMIT)
            .bind(consumer_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|row| {
            rate_limit(row.id, row.requests_per_second, row.burst_size).map(|limit| {
                ConsumerRateLimit { id: row.id, consumer_id: row.consumer_id, limit }
            })
        }))
    }

    async fn find_rate_limit_policies_by_ids(&self, ids: &[PolicyId]) -> Result<Vec<RateLimitPolicy>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<PolicyRow> =
            sqlx::query_as(POLICIES_BY_IDS).bind(ids).fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                rate_limit(row.id, row.requests_per_second, row.burst_size)
                    .map(|limit| RateLimitPolicy { id: row.id, limit })
            })
            .collect())
    }
}
