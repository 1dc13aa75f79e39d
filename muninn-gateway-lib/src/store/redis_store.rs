use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use std::sync::Arc;
use tracing::{debug, info};

use super::{BucketReply, BucketRequest, CoordinationStore};
use crate::error::StoreError;

/// Token bucket evaluated inside Redis.
///
/// KEYS[1] = bucket key
/// ARGV    = rate per second, burst capacity, now (ms), ttl (s)
/// Returns {allowed (0|1), remaining tokens, reset time (ms)}
pub const TOKEN_BUCKET_SCRIPT: &str = r"
local key = KEYS[1]
local rate = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local state = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(state[1])
local last_refill = tonumber(state[2])
if tokens == nil or last_refill == nil then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill) / 1000
tokens = math.min(capacity, tokens + elapsed * rate)

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('HSET', key, 'tokens', tostring(tokens), 'last_refill', tostring(math.max(now, last_refill)))
redis.call('EXPIRE', key, ttl)

local reset = now
if tokens < capacity then
    reset = now + math.ceil((capacity - tokens) / rate) * 1000
end

return { allowed, math.floor(tokens), reset }
";

/// Redis-backed coordination store.
///
/// The [`ConnectionManager`] is created on first use and reconnects on its own
/// afterwards. While Redis cannot be reached at all, every call fails with
/// [`StoreErrorKind::Connection`](crate::error::StoreErrorKind::Connection) and
/// the next call tries again. Each call is a single `EVALSHA` (falling back to
/// `EVAL` when the script is not cached yet).
#[derive(Clone)]
pub struct RedisCoordinationStore {
    client: redis::Client,
    conn: Arc<ArcSwapOption<ConnectionManager>>,
    script: Script,
}

impl RedisCoordinationStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client, conn: Arc::new(ArcSwapOption::empty()), script: Script::new(TOKEN_BUCKET_SCRIPT) }
    }

    /// Parses `url` only; no connection is made until the first call.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        Ok(Self::new(client))
    }

    pub fn is_connected(&self) -> bool {
        self.conn.load().is_some()
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        if let Some(conn) = self.conn.load_full() {
            return Ok((*conn).clone());
        }
        let conn = ConnectionManager::new(self.client.clone())
            .await
            .map_err(|e| StoreError::connection(format!("failed to connect to redis: {e}")))?;
        self.conn.store(Some(Arc::new(conn.clone())));
        info!("coordination store connected");
        Ok(conn)
    }
}

#[async_trait]
impl CoordinationStore for RedisCoordinationStore {
    async fn take_token(
        &self,
        request: &BucketRequest,
        now_ms: u64,
    ) -> Result<BucketReply, StoreError> {
        let mut conn = self.connection().await?;
        let (allowed, remaining, reset_time_ms): (i64, i64, i64) = self
            .script
            .key(&request.key)
            .arg(request.limit.requests_per_second.max(1))
            .arg(request.limit.burst_size)
            .arg(now_ms)
            .arg(request.ttl_secs)
            .invoke_async(&mut conn)
            .await?;

        if !(allowed == 0 || allowed == 1) || remaining < 0 || reset_time_ms < 0 {
            return Err(StoreError::protocol(format!(
                "unexpected token bucket reply ({allowed}, {remaining}, {reset_time_ms})"
            )));
        }

        debug!(key = %request.key, allowed, remaining, "token bucket evaluated");
        Ok(BucketReply {
            allowed: allowed == 1,
            remaining: remaining as u64,
            reset_time_ms: reset_time_ms as u64,
        })
    }
}
