mod common;

use std::sync::Arc;

use common::{route, TestResult};
use muninn_gateway_lib::config::RouteCacheConfig;
use muninn_gateway_lib::repository::InMemoryRepository;
use muninn_gateway_lib::routing::{build_definitions, path_matches};
use muninn_gateway_lib::{Route, RouteCache, RouteLocator};

async fn locator_for(routes: Vec<Route>) -> Result<(RouteLocator, Arc<InMemoryRepository>, Arc<RouteCache>), Box<dyn std::error::Error + Send + Sync>> {
    let repo = Arc::new(InMemoryRepository::new());
    repo.set_routes(routes);
    let cache = Arc::new(RouteCache::new(repo.clone(), &RouteCacheConfig::default()));
    cache.refresh().await?;
    Ok((RouteLocator::new(cache.clone()), repo, cache))
}

#[test]
fn path_rule_examples() {
    assert!(path_matches("/api/orders", "/api/orders"));
    assert!(path_matches("/api/orders/123", "/api/orders"));
    assert!(!path_matches("/api/ordershistory", "/api/orders"));
    assert!(!path_matches("/api/ord", "/api/orders"));
}

#[tokio::test]
async fn most_specific_route_wins() -> TestResult {
    let (locator, _, _) = locator_for(vec![
        route("/", "http://web:8080"),
        route("/api", "http://api:8080"),
        route("/api/orders", "http://orders:8080"),
    ])
    .await?;

    let hit = locator.locate("/api/orders/42", "GET").ok_or("no route for /api/orders/42")?;
    assert_eq!(hit.path, "/api/orders");
    let hit = locator.locate("/api/users", "GET").ok_or("no route for /api/users")?;
    assert_eq!(hit.path, "/api");
    let hit = locator.locate("/", "GET").ok_or("no route for /")?;
    assert_eq!(hit.path, "/");
    // the root route is not a catch-all
    assert!(locator.locate("/index.html", "GET").is_none());
    Ok(())
}

#[tokio::test]
async fn methods_are_matched_case_insensitively() -> TestResult {
    let mut orders = route("/api/orders", "http://orders:8080");
    orders.methods = vec!["get".to_string(), "POST".to_string()];
    let (locator, _, _) = locator_for(vec![orders]).await?;

    assert!(locator.locate("/api/orders", "GET").is_some());
    assert!(locator.locate("/api/orders", "post").is_some());
    assert!(locator.locate("/api/orders", "DELETE").is_none());
    Ok(())
}

#[tokio::test]
async fn unusable_routes_are_skipped() -> TestResult {
    let mut no_id = route("/no-id", "http://x:1");
    no_id.id = None;
    let bad_upstream = route("/bad-upstream", "not a url");
    let relative = route("relative", "http://x:1");
    let mut bad_method = route("/bad-method", "http://x:1");
    bad_method.methods = vec!["GE T".to_string()];

    let (locator, _, _) = locator_for(vec![
        no_id,
        bad_upstream,
        relative,
        bad_method,
        route("/ok", "http://ok:1"),
    ])
    .await?;

    let routes = locator.routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].path, "/ok");
    assert!(locator.locate("/no-id", "GET").is_none());
    Ok(())
}

#[test]
fn duplicate_ids_keep_first_route() {
    let first = route("/first", "http://a:1");
    let mut second = route("/second", "http://b:1");
    second.id = first.id;

    let definitions = build_definitions(&[first, second]);
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].path, "/first");
}

#[tokio::test]
async fn locator_follows_cache_refreshes() -> TestResult {
    let (locator, repo, cache) = locator_for(vec![route("/old", "http://old:1")]).await?;
    assert!(locator.locate("/old", "GET").is_some());

    repo.set_routes(vec![route("/new", "http://new:1")]);
    cache.refresh().await?;

    assert!(locator.locate("/old", "GET").is_none());
    let hit = locator.locate("/new/path", "GET").ok_or("no route for /new/path")?;
    assert_eq!(hit.upstream.host(), Some("new"));
    Ok(())
}

#[tokio::test]
async fn no_routes_match_nothing() -> TestResult {
    let (locator, _, _) = locator_for(Vec::new()).await?;
    assert!(locator.locate("/", "GET").is_none());
    Ok(())
}
