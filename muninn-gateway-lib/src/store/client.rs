use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{BucketReply, BucketRequest, CoordinationStore};
use crate::clock::Clock;
use crate::config::RedisConfig;
use crate::error::StoreError;

/// Deadlines and retry budget applied to every store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Deadline of one attempt
    pub timeout: Duration,
    /// Deadline of the whole call, retries and backoff included
    pub deadline: Duration,
    /// Attempts after the first one
    pub max_retries: u32,
    /// Sleep before the first retry, doubled after each retry
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RedisConfig) -> Self {
        Self {
            timeout: config.timeout(),
            deadline: config.check_timeout(),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        }
    }

    /// Single attempt, no waiting between failures.
    pub fn no_retry(timeout: Duration) -> Self {
        Self { timeout, deadline: timeout, max_retries: 0, backoff: Duration::ZERO }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RedisConfig::default())
    }
}

/// Client boundary of the coordination store.
///
/// Bounds each attempt with a timeout and the whole call with a deadline (an
/// expired one is a
/// [`StoreErrorKind::Timeout`](crate::error::StoreErrorKind::Timeout)), and
/// retries transient failures with exponential backoff. Protocol errors are
/// returned immediately.
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn CoordinationStore>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl StoreClient {
    pub fn new(store: Arc<dyn CoordinationStore>, policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { store, policy, clock }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Take a token, retrying transient failures until the deadline.
    pub async fn take_token(&self, request: &BucketRequest) -> Result<BucketReply, StoreError> {
        match tokio::time::timeout(self.policy.deadline, self.take_with_retries(request)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::timeout(format!(
                "no reply within the {}ms check deadline",
                self.policy.deadline.as_millis()
            ))),
        }
    }

    /// One attempt, no retries. Used to probe a store already known to be down.
    pub async fn take_token_once(&self, request: &BucketRequest) -> Result<BucketReply, StoreError> {
        let timeout = self.policy.timeout.min(self.policy.deadline);
        let now_ms = self.clock.now_millis();
        match tokio::time::timeout(timeout, self.store.take_token(request, now_ms)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::timeout(format!("no reply within {}ms", timeout.as_millis()))),
        }
    }

    async fn take_with_retries(&self, request: &BucketRequest) -> Result<BucketReply, StoreError> {
        let mut attempt: u32 = 0;
        let mut backoff = self.policy.backoff;

        loop {
            match self.take_token_once(request).await {
                Ok(reply) => return Ok(reply),
                Err(err) if err.kind().is_transient() && attempt < self.policy.max_retries => {
                    attempt = attempt.saturating_add(1);
                    debug!(
                        key = %request.key,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying coordination store call"
                    );
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                    backoff = backoff.saturating_mul(2);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
