//! In-memory view of the published routes.
//!
//! Readers get an `Arc` to an immutable snapshot; [`RouteCache::refresh`]
//! builds a new list off to the side and swaps it in with one atomic store, so
//! a reader sees either the previous list or the new one and never a mix.

use arc_swap::ArcSwapOption;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::RouteCacheConfig;
use crate::error::Result;
use crate::model::{Route, RouteId};
use crate::repository::GatewayRepository;
use crate::telemetry::metrics::{values, Metrics};

pub struct RouteCache {
    repository: Arc<dyn GatewayRepository>,
    /// `None` until the first successful refresh
    snapshot: ArcSwapOption<Vec<Route>>,
    /// Bounded, expiring copy of the last loaded routes
    fallback: Cache<RouteId, Route>,
    /// Bumped after every swap; the routing layer rebuilds when it moves
    generation: watch::Sender<u64>,
    metrics: Option<Arc<Metrics>>,
}

impl RouteCache {
    pub fn new(repository: Arc<dyn GatewayRepository>, config: &RouteCacheConfig) -> Self {
        let fallback = Cache::builder()
            .max_capacity(config.max_size)
            .time_to_live(config.ttl())
            .build();
        let (generation, _) = watch::channel(0);
        Self { repository, snapshot: ArcSwapOption::empty(), fallback, generation, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Reload published routes and swap them in.
    ///
    /// On failure the current snapshot stays in effect. Concurrent refreshes
    /// are fine: each stores a complete list, the last one wins.
    pub async fn refresh(&self) -> Result<usize> {
        let routes = match self.repository.find_published_routes().await {
            Ok(routes) => routes,
            Err(e) => {
                error!(error = %e, "failed to refresh routes, keeping previous snapshot");
                if let Some(m) = &self.metrics {
                    m.record_route_refresh(values::OUTCOME_FAILURE);
                }
                return Err(e);
            }
        };

        let routes: Vec<Route> = routes.into_iter().filter(Route::is_published).collect();
        let count = routes.len();

        self.snapshot.store(Some(Arc::new(routes.clone())));

        self.fallback.invalidate_all();
        for route in routes {
            if let Some(id) = route.id {
                self.fallback.insert(id, route);
            }
        }

        self.generation.send_modify(|g| *g = g.wrapping_add(1));

        info!(routes = count, "route cache refreshed");
        if let Some(m) = &self.metrics {
            m.record_route_refresh(values::OUTCOME_SUCCESS);
            m.set_route_cache_size(count);
        }
        Ok(count)
    }

    /// Forget the snapshot and go back to the never-loaded state.
    ///
    /// The secondary cache is kept, so readers are served the last loaded
    /// routes until its entries expire or the next refresh succeeds.
    pub fn clear(&self) {
        if self.snapshot.swap(None).is_some() {
            self.generation.send_modify(|g| *g = g.wrapping_add(1));
            info!(fallback_routes = self.fallback.entry_count(), "route snapshot cleared");
        }
    }

    /// Current routes. Never blocks and never fails.
    ///
    /// Without a snapshot (before the first successful refresh, or after
    /// [`RouteCache::clear`]) this reads the secondary cache, and yields an
    /// empty list when that is empty too.
    pub fn cached_routes(&self) -> Arc<Vec<Route>> {
        if let Some(snapshot) = self.snapshot.load_full() {
            return snapshot;
        }
        let mut routes: Vec<Route> = self.fallback.iter().map(|(_, route)| route).collect();
        routes.sort_by(|a, b| a.path.cmp(&b.path));
        Arc::new(routes)
    }

    /// Whether a refresh ever succeeded; an empty list after that is a real
    /// "no published routes".
    pub fn is_loaded(&self) -> bool {
        self.snapshot.load().is_some()
    }

    pub fn size(&self) -> usize {
        self.cached_routes().len()
    }

    /// Alias of [`RouteCache::size`] for operators.
    pub fn cache_size(&self) -> usize {
        self.size()
    }

    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Receiver that observes a new generation after each successful refresh.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Cold-start refresh: failures are logged, the gateway starts with no routes.
    pub async fn warm_up(&self) {
        if let Err(e) = self.refresh().await {
            error!(error = %e, "initial route refresh failed, serving no routes until next refresh");
        }
    }

    /// Refresh every `interval` until `cancel` fires.
    pub fn spawn_periodic_refresh(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // first tick completes immediately, warm_up already covered it
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("periodic route refresh stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        // errors are already logged by refresh
                        let _ = cache.refresh().await;
                    }
                }
            }
        })
    }
}
