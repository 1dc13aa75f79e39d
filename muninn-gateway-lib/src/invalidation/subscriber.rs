use arc_swap::ArcSwapOption;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::handler::InvalidationHandler;
use super::source::{InvalidationSource, PayloadStream};
use super::state::{ChannelState, StateCell};
use crate::error::GatewayError;
use crate::telemetry::metrics::{values, Metrics};

/// Keeps one pub/sub channel subscribed and feeds its messages to a handler.
///
/// `Disconnected → Subscribing → Subscribed`, and back to `Disconnected` on
/// any failure, at which point exactly one reconnect is scheduled after the
/// configured delay. Further disconnect signals while that reconnect is pending
/// are ignored; the guard is released once the attempt finishes, whether it
/// succeeded or not.
#[derive(Clone)]
pub struct InvalidationSubscriber {
    inner: Arc<Inner>,
}

struct Inner {
    channel: String,
    source: Arc<dyn InvalidationSource>,
    handler: Arc<dyn InvalidationHandler>,
    state: StateCell,
    reconnect_pending: AtomicBool,
    reconnect_delay: Duration,
    reconnect_attempts: AtomicU64,
    /// Cancels the listener of the live subscription
    session: ArcSwapOption<CancellationToken>,
    shutdown: CancellationToken,
    metrics: ArcSwapOption<Metrics>,
}

enum ListenEnd {
    StreamClosed,
    Superseded,
    Shutdown,
}

impl InvalidationSubscriber {
    pub fn new(
        channel: impl Into<String>,
        source: Arc<dyn InvalidationSource>,
        handler: Arc<dyn InvalidationHandler>,
        reconnect_delay: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                channel: channel.into(),
                source,
                handler,
                state: StateCell::new(ChannelState::Disconnected),
                reconnect_pending: AtomicBool::new(false),
                reconnect_delay,
                reconnect_attempts: AtomicU64::new(0),
                session: ArcSwapOption::empty(),
                shutdown,
                metrics: ArcSwapOption::empty(),
            }),
        }
    }

    /// Shared by every clone of this subscriber, including running tasks.
    pub fn with_metrics(self, metrics: Arc<Metrics>) -> Self {
        self.inner.metrics.store(Some(metrics));
        self
    }

    pub fn has_metrics(&self) -> bool {
        self.inner.metrics.load().is_some()
    }

    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    pub fn state(&self) -> ChannelState {
        self.inner.state.get()
    }

    /// Reconnect attempts made so far (the initial subscribe is not counted).
    pub fn reconnect_attempts(&self) -> u64 {
        self.inner.reconnect_attempts.load(Ordering::Acquire)
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.inner.reconnect_pending.load(Ordering::Acquire)
    }

    /// Subscribe in a background task and keep listening.
    pub fn start(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            match inner.subscribe_once().await {
                Some(stream) => inner.listen(stream).await,
                None => {
                    inner.disconnected("initial subscribe failed");
                }
            }
        })
    }

    /// Report that the subscription is gone. Returns `true` if this call
    /// scheduled the reconnect.
    pub fn notify_disconnected(&self, reason: &str) -> bool {
        self.inner.disconnected(reason)
    }

    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    async fn subscribe_once(&self) -> Option<PayloadStream> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        self.state.set(ChannelState::Subscribing);
        match self.source.subscribe(&self.channel).await {
            Ok(stream) => {
                self.state.set(ChannelState::Subscribed);
                info!(channel = %self.channel, "invalidation channel subscribed");
                Some(stream)
            }
            Err(e) => {
                self.state.set(ChannelState::Disconnected);
                warn!(channel = %self.channel, error = %e, "invalidation subscribe failed");
                None
            }
        }
    }

    async fn listen(self: &Arc<Self>, mut stream: PayloadStream) {
        let session = self.shutdown.child_token();
        if let Some(previous) = self.session.swap(Some(Arc::new(session.clone()))) {
            previous.cancel();
        }

        let end = loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break ListenEnd::Shutdown,
                _ = session.cancelled() => break ListenEnd::Superseded,
                next = stream.next() => match next {
                    Some(payload) => self.dispatch(&payload).await,
                    None => break ListenEnd::StreamClosed,
                },
            }
        };

        match end {
            ListenEnd::StreamClosed => {
                self.disconnected("subscription stream closed");
            }
            ListenEnd::Superseded => {
                debug!(channel = %self.channel, "listener replaced");
            }
            ListenEnd::Shutdown => {
                self.state.set(ChannelState::Disconnected);
                info!(channel = %self.channel, "invalidation listener stopped");
            }
        }
    }

    async fn dispatch(&self, payload: &str) {
        let outcome = match self.handler.handle(payload).await {
            Ok(()) => values::OUTCOME_ACCEPTED,
            Err(GatewayError::MalformedPayload(reason)) => {
                warn!(channel = %self.channel, %reason, "dropping malformed invalidation message");
                values::OUTCOME_DROPPED
            }
            Err(e) => {
                error!(channel = %self.channel, error = %e, "invalidation could not be applied");
                values::OUTCOME_FAILURE
            }
        };
        if let Some(m) = self.metrics.load_full() {
            m.record_invalidation_message(&self.channel, outcome);
        }
    }

    fn disconnected(self: &Arc<Self>, reason: &str) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        if let Some(session) = self.session.swap(None) {
            session.cancel();
        }
        if self.state.set(ChannelState::Disconnected) != ChannelState::Disconnected {
            warn!(channel = %self.channel, reason, "invalidation channel disconnected");
        }
        self.schedule_reconnect()
    }

    fn schedule_reconnect(self: &Arc<Self>) -> bool {
        if self
            .reconnect_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(channel = %self.channel, "reconnect already scheduled");
            return false;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = inner.shutdown.cancelled() => {
                    inner.reconnect_pending.store(false, Ordering::Release);
                    return;
                }
                _ = tokio::time::sleep(inner.reconnect_delay) => {}
            }

            let attempt = inner.reconnect_attempts.fetch_add(1, Ordering::AcqRel).saturating_add(1);
            info!(channel = %inner.channel, attempt, "reconnecting invalidation channel");
            if let Some(m) = inner.metrics.load_full() {
                m.record_reconnect(&inner.channel);
            }

            let stream = inner.subscribe_once().await;
            inner.reconnect_pending.store(false, Ordering::Release);

            match stream {
                Some(stream) => inner.listen(stream).await,
                None => {
                    inner.disconnected("reconnect failed");
                }
            }
        });
        true
    }
}
