use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::warn;

use crate::error::{GatewayError, Result};

/// Payloads of one subscription; the stream ends when the subscription drops.
pub type PayloadStream = BoxStream<'static, String>;

/// Something that can subscribe to a pub/sub channel.
#[async_trait]
pub trait InvalidationSource: Send + Sync {
    async fn subscribe(&self, channel: &str) -> Result<PayloadStream>;
}

/// Redis pub/sub. Every subscription gets its own dedicated connection.
#[derive(Clone)]
pub struct RedisInvalidationSource {
    client: redis::Client,
}

impl RedisInvalidationSource {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| GatewayError::Subscription(format!("invalid redis url: {e}")))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl InvalidationSource for RedisInvalidationSource {
    async fn subscribe(&self, channel: &str) -> Result<PayloadStream> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| GatewayError::Subscription(format!("failed to connect: {e}")))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| GatewayError::Subscription(format!("failed to subscribe to {channel}: {e}")))?;

        let channel = channel.to_string();
        let stream = pubsub
            .into_on_message()
            .filter_map(move |msg| {
                let payload = match msg.get_payload::<String>() {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "dropping non-text invalidation payload");
                        None
                    }
                };
                futures::future::ready(payload)
            })
            .boxed();
        Ok(stream)
    }
}
