use ahash::AHashSet;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::definition::RouteDefinition;
use crate::cache::RouteCache;
use crate::model::Route;

/// Compile routes into predicates, skipping the ones that cannot be served.
///
/// Longer paths come first so the most specific route wins; among equal paths
/// the snapshot order is kept. A duplicate id keeps its first occurrence.
pub fn build_definitions(routes: &[Route]) -> Vec<Arc<RouteDefinition>> {
    let mut seen = AHashSet::with_capacity(routes.len());
    let mut definitions: Vec<Arc<RouteDefinition>> = Vec::with_capacity(routes.len());

    for route in routes {
        match RouteDefinition::from_route(route) {
            Ok(definition) => {
                if !seen.insert(definition.id) {
                    warn!(route_id = %definition.id, path = %route.path, "skipping duplicate route id");
                    continue;
                }
                definitions.push(Arc::new(definition));
            }
            Err(e) => {
                warn!(path = %route.path, upstream = %route.upstream_url, error = %e, "skipping route");
            }
        }
    }

    definitions.sort_by(|a, b| {
        b.path.trim_end_matches('/').len().cmp(&a.path.trim_end_matches('/').len())
    });
    definitions
}

struct Compiled {
    generation: u64,
    definitions: Arc<Vec<Arc<RouteDefinition>>>,
}

/// Routing predicates derived from the [`RouteCache`] snapshot.
///
/// The compiled set is tagged with the cache generation it was built from.
/// When the cache reports a newer generation the next lookup rebuilds and
/// swaps the set; requests already holding the old set finish with it.
pub struct RouteLocator {
    cache: Arc<RouteCache>,
    compiled: ArcSwap<Compiled>,
}

impl RouteLocator {
    pub fn new(cache: Arc<RouteCache>) -> Self {
        let compiled = Compiled {
            generation: cache.generation(),
            definitions: Arc::new(build_definitions(&cache.cached_routes())),
        };
        Self { cache, compiled: ArcSwap::from_pointee(compiled) }
    }

    /// All current route definitions.
    pub fn routes(&self) -> Arc<Vec<Arc<RouteDefinition>>> {
        let generation = self.cache.generation();
        let current = self.compiled.load();
        if current.generation == generation {
            return Arc::clone(&current.definitions);
        }

        let definitions = Arc::new(build_definitions(&self.cache.cached_routes()));
        debug!(generation, routes = definitions.len(), "route predicates rebuilt");
        self.compiled.store(Arc::new(Compiled { generation, definitions: Arc::clone(&definitions) }));
        definitions
    }

    /// First route accepting this request, if any.
    pub fn locate(&self, path: &str, method: &str) -> Option<Arc<RouteDefinition>> {
        self.routes().iter().find(|d| d.matches(path, method)).cloned()
    }
}
