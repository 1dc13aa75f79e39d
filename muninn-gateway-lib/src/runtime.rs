//! Wiring of the data plane components and their background tasks.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::{ConsumerRateLimitCache, PolicyCache, RouteCache};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::gate::RequestGate;
use crate::invalidation::{
    InvalidationSource, InvalidationSubscriber, RateLimitInvalidationHandler, RedisInvalidationSource,
    RouteInvalidationHandler,
};
use crate::rate_limit::RateLimitService;
use crate::repository::{GatewayRepository, PgGatewayRepository};
use crate::routing::RouteLocator;
use crate::store::{CoordinationStore, RedisCoordinationStore, RetryPolicy, StoreClient};
use crate::telemetry::Metrics;

/// External collaborators of the data plane.
pub struct Backends {
    pub repository: Arc<dyn GatewayRepository>,
    pub store: Arc<dyn CoordinationStore>,
    pub source: Arc<dyn InvalidationSource>,
    pub clock: Arc<dyn Clock>,
}

/// Every cache, the rate limiter and the two invalidation subscribers of one
/// gateway instance.
pub struct DataPlane {
    config: Config,
    routes: Arc<RouteCache>,
    locator: Arc<RouteLocator>,
    consumers: Arc<ConsumerRateLimitCache>,
    policies: Arc<PolicyCache>,
    rate_limits: Arc<RateLimitService>,
    gate: Arc<RequestGate>,
    route_subscriber: InvalidationSubscriber,
    rate_limit_subscriber: InvalidationSubscriber,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl DataPlane {
    /// Set up the Postgres and Redis backends as configured.
    ///
    /// Only malformed URLs fail here. Connections are opened on first use, so
    /// the data plane starts while either backend is down: routes stay empty
    /// until a refresh succeeds and rate limiting runs on the local fallback.
    pub fn connect(config: Config, metrics: Option<Arc<Metrics>>) -> Result<Self> {
        let repository = PgGatewayRepository::connect_lazy(&config.database)?;
        let store = RedisCoordinationStore::open(&config.redis.url)?;
        let source = RedisInvalidationSource::open(&config.redis.url)?;
        info!(redis = %config.redis.url, "backends configured");

        let backends = Backends {
            repository: Arc::new(repository),
            store: Arc::new(store),
            source: Arc::new(source),
            clock: Arc::new(SystemClock),
        };
        Ok(Self::build(config, backends, metrics))
    }

    pub fn build(config: Config, backends: Backends, metrics: Option<Arc<Metrics>>) -> Self {
        let Backends { repository, store, source, clock } = backends;
        let shutdown = CancellationToken::new();

        let mut routes = RouteCache::new(Arc::clone(&repository), &config.route_cache);
        if let Some(m) = &metrics {
            routes = routes.with_metrics(Arc::clone(m));
        }
        let routes = Arc::new(routes);
        let locator = Arc::new(RouteLocator::new(Arc::clone(&routes)));

        let consumers = Arc::new(ConsumerRateLimitCache::new(Arc::clone(&repository), &config.consumer_cache));
        let policies = Arc::new(PolicyCache::new(
            Arc::clone(&repository),
            config.consumer_cache.ttl(),
            config.consumer_cache.max_size,
        ));

        let client = StoreClient::new(store, RetryPolicy::from_config(&config.redis), Arc::clone(&clock));
        let mut rate_limits =
            RateLimitService::new(client, &config.redis, &config.rate_limit.fallback, Arc::clone(&clock));
        if let Some(m) = &metrics {
            rate_limits = rate_limits.with_metrics(Arc::clone(m));
        }
        let rate_limits = Arc::new(rate_limits);

        let gate = Arc::new(RequestGate::new(
            Arc::clone(&locator),
            Arc::clone(&policies),
            Arc::clone(&consumers),
            Arc::clone(&rate_limits),
            clock,
        ));

        let delay = config.invalidation.reconnect_delay();
        let mut route_subscriber = InvalidationSubscriber::new(
            config.invalidation.route_channel.clone(),
            Arc::clone(&source),
            Arc::new(RouteInvalidationHandler::new(Arc::clone(&routes))),
            delay,
            shutdown.child_token(),
        );
        let mut rate_limit_subscriber = InvalidationSubscriber::new(
            config.invalidation.rate_limit_channel.clone(),
            source,
            Arc::new(RateLimitInvalidationHandler::new(Arc::clone(&policies), Arc::clone(&consumers))),
            delay,
            shutdown.child_token(),
        );
        if let Some(m) = &metrics {
            route_subscriber = route_subscriber.with_metrics(Arc::clone(m));
            rate_limit_subscriber = rate_limit_subscriber.with_metrics(Arc::clone(m));
        }

        Self {
            config,
            routes,
            locator,
            consumers,
            policies,
            rate_limits,
            gate,
            route_subscriber,
            rate_limit_subscriber,
            shutdown,
            tasks: Vec::new(),
        }
    }

    /// Load the initial route snapshot and start the background tasks.
    pub async fn start(&mut self) {
        self.routes.warm_up().await;
        info!(routes = self.routes.size(), "route snapshot loaded");

        self.tasks.push(self.route_subscriber.start());
        self.tasks.push(self.rate_limit_subscriber.start());

        if self.config.route_cache.periodic_refresh {
            let interval = self.config.route_cache.ttl();
            self.tasks
                .push(self.routes.spawn_periodic_refresh(interval, self.shutdown.child_token()));
        }
    }

    /// Stop background tasks, waiting at most `grace` for them to finish.
    pub async fn shutdown(mut self, grace: Duration) {
        self.shutdown.cancel();
        let tasks = std::mem::take(&mut self.tasks);
        let joined = tokio::time::timeout(grace, futures::future::join_all(tasks)).await;
        match joined {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(error = %e, "background task ended abnormally");
                    }
                }
                info!("data plane stopped");
            }
            Err(_) => warn!(?grace, "background tasks did not stop in time"),
        }
    }

    pub fn gate(&self) -> &Arc<RequestGate> {
        &self.gate
    }

    pub fn routes(&self) -> &Arc<RouteCache> {
        &self.routes
    }

    pub fn locator(&self) -> &Arc<RouteLocator> {
        &self.locator
    }

    pub fn consumers(&self) -> &Arc<ConsumerRateLimitCache> {
        &self.consumers
    }

    pub fn policies(&self) -> &Arc<PolicyCache> {
        &self.policies
    }

    pub fn rate_limits(&self) -> &Arc<RateLimitService> {
        &self.rate_limits
    }

    pub fn route_subscriber(&self) -> &InvalidationSubscriber {
        &self.route_subscriber
    }

    pub fn rate_limit_subscriber(&self) -> &InvalidationSubscriber {
        &self.rate_limit_subscriber
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
