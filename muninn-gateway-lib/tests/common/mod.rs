//! Shared doubles for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use muninn_gateway_lib::error::{GatewayError, StoreError, StoreErrorKind};
use muninn_gateway_lib::invalidation::{InvalidationSource, PayloadStream};
use muninn_gateway_lib::store::{BucketReply, BucketRequest, CoordinationStore, InMemoryCoordinationStore};
use muninn_gateway_lib::{PolicyId, Route, RouteStatus};
use uuid::Uuid;

pub type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub fn route(path: &str, upstream: &str) -> Route {
    Route {
        id: Some(Uuid::new_v4()),
        path: path.to_string(),
        upstream_url: upstream.to_string(),
        methods: Vec::new(),
        status: RouteStatus::Published,
        rate_limit_policy_id: None,
    }
}

pub fn limited_route(path: &str, upstream: &str, policy: PolicyId) -> Route {
    Route { rate_limit_policy_id: Some(policy), ..route(path, upstream) }
}

/// Coordination store that can be switched into failing with a given error kind.
pub struct ToggleStore {
    inner: InMemoryCoordinationStore,
    failure: Mutex<Option<StoreErrorKind>>,
    calls: AtomicUsize,
}

impl ToggleStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryCoordinationStore::default(),
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_with(&self, kind: StoreErrorKind) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(kind);
        }
    }

    pub fn recover(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CoordinationStore for ToggleStore {
    async fn take_token(&self, request: &BucketRequest, now_ms: u64) -> Result<BucketReply, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.failure.lock().ok().and_then(|f| *f);
        match failure {
            Some(StoreErrorKind::Timeout) => Err(StoreError::timeout("simulated timeout")),
            Some(StoreErrorKind::Connection) => Err(StoreError::connection("connection refused")),
            Some(StoreErrorKind::Protocol) => Err(StoreError::protocol("unexpected reply")),
            None => self.inner.take_token(request, now_ms).await,
        }
    }
}

/// Pub/sub source backed by in-process channels.
///
/// Every successful `subscribe` opens a new stream; `publish` feeds the most
/// recent one and `drop_subscriptions` ends all of them.
#[derive(Default)]
pub struct ChannelSource {
    senders: Mutex<Vec<mpsc::UnboundedSender<String>>>,
    subscribe_calls: AtomicUsize,
    refuse: AtomicBool,
}

impl ChannelSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn refuse_subscriptions(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn publish(&self, payload: &str) -> bool {
        match self.senders.lock() {
            Ok(senders) => match senders.last() {
                Some(tx) => tx.unbounded_send(payload.to_string()).is_ok(),
                None => false,
            },
            Err(_) => false,
        }
    }

    pub fn drop_subscriptions(&self) {
        if let Ok(mut senders) = self.senders.lock() {
            senders.clear();
        }
    }
}

#[async_trait]
impl InvalidationSource for ChannelSource {
    async fn subscribe(&self, channel: &str) -> muninn_gateway_lib::Result<PayloadStream> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(GatewayError::Subscription(format!("cannot subscribe to {channel}")));
        }
        let (tx, rx) = mpsc::unbounded();
        if let Ok(mut senders) = self.senders.lock() {
            senders.push(tx);
        }
        Ok(rx.boxed())
    }
}

/// Let spawned tasks run until they block again.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Poll `condition` until it holds, giving up after about a second of
/// (possibly paused) tokio time.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    condition()
}
