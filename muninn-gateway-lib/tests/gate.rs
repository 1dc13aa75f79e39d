mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{eventually, limited_route, route, ChannelSource, TestResult};
use muninn_gateway_lib::clock::ManualClock;
use muninn_gateway_lib::repository::InMemoryRepository;
use muninn_gateway_lib::store::InMemoryCoordinationStore;
use muninn_gateway_lib::{
    Backends, ChannelState, Config, ConsumerRateLimit, DataPlane, GateDecision, LimitScope, RateLimit,
    RateLimitPolicy,
};
use uuid::Uuid;

const START_MS: u64 = 1_700_000_000_000;

struct Harness {
    repo: Arc<InMemoryRepository>,
    source: Arc<ChannelSource>,
    plane: DataPlane,
}

async fn harness(config: Config) -> Result<Harness, Box<dyn std::error::Error + Send + Sync>> {
    let repo = Arc::new(InMemoryRepository::new());
    let source = ChannelSource::new();
    let plane = DataPlane::build(
        config,
        Backends {
            repository: repo.clone(),
            store: Arc::new(InMemoryCoordinationStore::default()),
            source: source.clone(),
            clock: Arc::new(ManualClock::new(START_MS)),
        },
        None,
    );
    Ok(Harness { repo, source, plane })
}

fn policy(repo: &InMemoryRepository, rps: u32, burst: u32) -> Uuid {
    let id = Uuid::new_v4();
    repo.put_policy(RateLimitPolicy { id, limit: RateLimit::new(rps, burst) });
    id
}

fn consumer(repo: &InMemoryRepository, consumer_id: &str, rps: u32, burst: u32) {
    repo.put_consumer(ConsumerRateLimit {
        id: Uuid::new_v4(),
        consumer_id: consumer_id.to_string(),
        limit: RateLimit::new(rps, burst),
    });
}

#[tokio::test]
async fn unknown_path_has_no_route() -> TestResult {
    let h = harness(Config::default()).await?;
    h.repo.set_routes(vec![route("/api", "http://api:8080")]);
    h.plane.routes().refresh().await?;

    let decision = h.plane.gate().check_request("/web", "GET", None, "10.0.0.1").await;
    assert!(matches!(decision, GateDecision::NoRoute));
    assert!(decision.upstream_url().is_none());
    Ok(())
}

#[tokio::test]
async fn route_without_limits_is_unlimited() -> TestResult {
    let h = harness(Config::default()).await?;
    h.repo.set_routes(vec![route("/api", "http://api:8080")]);
    h.plane.routes().refresh().await?;

    let decision = h.plane.gate().check_request("/api/x", "GET", Some("anonymous"), "10.0.0.1").await;
    assert!(decision.is_allowed());
    let upstream = decision.upstream_url().ok_or("missing upstream")?;
    assert!(upstream.starts_with("http://api:8080"));
    let rate_limit = decision.rate_limit().ok_or("missing rate limit result")?;
    assert_eq!(rate_limit.scope, None);
    assert!(rate_limit.headers().is_empty());
    Ok(())
}

#[tokio::test]
async fn route_policy_limits_per_client() -> TestResult {
    let h = harness(Config::default()).await?;
    let id = policy(&h.repo, 1, 2);
    h.repo.set_routes(vec![limited_route("/api", "http://api:8080", id)]);
    h.plane.routes().refresh().await?;
    let gate = h.plane.gate();

    assert!(gate.check_request("/api", "GET", None, "10.0.0.1").await.is_allowed());
    assert!(gate.check_request("/api", "GET", None, "10.0.0.1").await.is_allowed());
    let denied = gate.check_request("/api", "GET", None, "10.0.0.1").await;
    assert!(matches!(denied, GateDecision::Limited { .. }));
    let rate_limit = denied.rate_limit().ok_or("missing rate limit result")?;
    assert_eq!(rate_limit.scope, Some(LimitScope::Route));
    assert_eq!(rate_limit.remaining, 0);

    assert!(gate.check_request("/api", "GET", None, "10.0.0.2").await.is_allowed());
    Ok(())
}

#[tokio::test]
async fn route_denial_does_not_spend_consumer_budget() -> TestResult {
    let h = harness(Config::default()).await?;
    let tight = policy(&h.repo, 1, 1);
    h.repo.set_routes(vec![
        limited_route("/tight", "http://tight:8080", tight),
        route("/open", "http://open:8080"),
    ]);
    consumer(&h.repo, "acme", 1, 5);
    h.plane.routes().refresh().await?;
    let gate = h.plane.gate();

    assert!(gate.check_request("/tight", "GET", Some("acme"), "10.0.0.1").await.is_allowed());
    for _ in 0..3 {
        let denied = gate.check_request("/tight", "GET", Some("acme"), "10.0.0.1").await;
        assert_eq!(denied.rate_limit().and_then(|r| r.scope), Some(LimitScope::Route));
    }

    let open = gate.check_request("/open", "GET", Some("acme"), "10.0.0.1").await;
    let rate_limit = open.rate_limit().ok_or("missing rate limit result")?;
    assert_eq!(rate_limit.scope, Some(LimitScope::Consumer));
    assert_eq!(rate_limit.remaining, 3);
    Ok(())
}

#[tokio::test]
async fn most_restrictive_allowance_is_reported() -> TestResult {
    let h = harness(Config::default()).await?;
    let generous = policy(&h.repo, 100, 100);
    h.repo.set_routes(vec![limited_route("/api", "http://api:8080", generous)]);
    consumer(&h.repo, "acme", 2, 2);
    h.plane.routes().refresh().await?;
    let gate = h.plane.gate();

    let first = gate.check_request("/api", "GET", Some("acme"), "10.0.0.1").await;
    let rate_limit = first.rate_limit().ok_or("missing rate limit result")?;
    assert!(first.is_allowed());
    assert_eq!(rate_limit.scope, Some(LimitScope::Consumer));
    assert_eq!(rate_limit.remaining, 1);
    assert_eq!(rate_limit.limit, 2);

    gate.check_request("/api", "GET", Some("acme"), "10.0.0.1").await;
    let denied = gate.check_request("/api", "GET", Some("acme"), "10.0.0.1").await;
    assert!(!denied.is_allowed());
    assert_eq!(denied.rate_limit().and_then(|r| r.scope), Some(LimitScope::Consumer));
    Ok(())
}

#[tokio::test]
async fn unavailable_policy_is_skipped() -> TestResult {
    let h = harness(Config::default()).await?;
    let id = policy(&h.repo, 1, 1);
    h.repo.set_routes(vec![limited_route("/api", "http://api:8080", id)]);
    h.plane.routes().refresh().await?;

    h.repo.set_failing(true);
    for _ in 0..3 {
        let decision = h.plane.gate().check_request("/api", "GET", Some("acme"), "10.0.0.1").await;
        assert!(decision.is_allowed());
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn data_plane_starts_and_stops() -> TestResult {
    let mut h = harness(Config::default()).await?;
    h.repo.set_routes(vec![route("/api", "http://api:8080")]);

    h.plane.start().await;
    assert_eq!(h.plane.routes().size(), 1);
    assert!(eventually(|| h.plane.route_subscriber().state() == ChannelState::Subscribed).await);
    assert!(eventually(|| h.plane.rate_limit_subscriber().state() == ChannelState::Subscribed).await);
    assert_eq!(h.source.subscribe_calls(), 2);

    h.plane.shutdown(Duration::from_secs(5)).await;
    Ok(())
}
