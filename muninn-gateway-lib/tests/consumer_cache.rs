mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::TestResult;
use muninn_gateway_lib::config::ConsumerCacheConfig;
use muninn_gateway_lib::repository::InMemoryRepository;
use muninn_gateway_lib::{ConsumerRateLimit, ConsumerRateLimitCache, PolicyCache, RateLimit, RateLimitPolicy};
use uuid::Uuid;

fn consumer(consumer_id: &str, policy: Uuid, rps: u32) -> ConsumerRateLimit {
    ConsumerRateLimit { id: policy, consumer_id: consumer_id.to_string(), limit: RateLimit::new(rps, rps * 2) }
}

#[tokio::test]
async fn absent_consumer_is_cached_as_none() -> TestResult {
    let repo = Arc::new(InMemoryRepository::new());
    let cache = ConsumerRateLimitCache::new(repo.clone(), &ConsumerCacheConfig::default());

    assert!(cache.get("ghost").await?.is_none());
    assert!(cache.get("ghost").await?.is_none());
    assert_eq!(repo.calls().consumer_rate_limit.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn found_consumer_is_served_from_cache() -> TestResult {
    let repo = Arc::new(InMemoryRepository::new());
    let policy = Uuid::new_v4();
    repo.put_consumer(consumer("acme", policy, 10));
    let cache = ConsumerRateLimitCache::new(repo.clone(), &ConsumerCacheConfig::default());

    let first = cache.get("acme").await?.ok_or("acme missing")?;
    assert_eq!(first.limit, RateLimit::new(10, 20));

    repo.put_consumer(consumer("acme", policy, 99));
    let second = cache.get("acme").await?.ok_or("acme missing")?;
    assert_eq!(second.limit, RateLimit::new(10, 20));
    assert_eq!(repo.calls().consumer_rate_limit.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn database_errors_are_not_cached() -> TestResult {
    let repo = Arc::new(InMemoryRepository::new());
    repo.put_consumer(consumer("acme", Uuid::new_v4(), 5));
    let cache = ConsumerRateLimitCache::new(repo.clone(), &ConsumerCacheConfig::default());

    repo.set_failing(true);
    assert!(cache.get("acme").await.is_err());
    repo.set_failing(false);
    assert!(cache.get("acme").await?.is_some());
    assert_eq!(repo.calls().consumer_rate_limit.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn invalidate_forces_reload() -> TestResult {
    let repo = Arc::new(InMemoryRepository::new());
    let cache = ConsumerRateLimitCache::new(repo.clone(), &ConsumerCacheConfig::default());
    assert!(cache.get("acme").await?.is_none());

    repo.put_consumer(consumer("acme", Uuid::new_v4(), 5));
    cache.invalidate("acme").await;
    assert!(cache.get("acme").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn invalidate_all_drops_every_entry() -> TestResult {
    let repo = Arc::new(InMemoryRepository::new());
    let cache = ConsumerRateLimitCache::new(repo.clone(), &ConsumerCacheConfig::default());
    cache.get("a").await?;
    cache.get("b").await?;

    cache.invalidate_all();
    cache.get("a").await?;
    cache.get("b").await?;
    assert_eq!(repo.calls().consumer_rate_limit.load(Ordering::SeqCst), 4);
    Ok(())
}

#[tokio::test]
async fn invalidate_policy_evicts_its_consumers_and_cached_absences() -> TestResult {
    let repo = Arc::new(InMemoryRepository::new());
    let gold = Uuid::new_v4();
    let silver = Uuid::new_v4();
    repo.put_consumer(consumer("a", gold, 100));
    repo.put_consumer(consumer("b", gold, 100));
    repo.put_consumer(consumer("c", silver, 10));
    let cache = ConsumerRateLimitCache::new(repo.clone(), &ConsumerCacheConfig::default());
    for id in ["a", "b", "c", "nobody"] {
        cache.get(id).await?;
    }

    assert_eq!(cache.invalidate_policy(gold).await, 3);

    let before = repo.calls().consumer_rate_limit.load(Ordering::SeqCst);
    for id in ["a", "b", "c", "nobody"] {
        cache.get(id).await?;
    }
    // "c" is still served from the cache
    assert_eq!(repo.calls().consumer_rate_limit.load(Ordering::SeqCst), before + 3);
    Ok(())
}

#[tokio::test]
async fn newly_attached_policy_replaces_cached_absence() -> TestResult {
    let repo = Arc::new(InMemoryRepository::new());
    let cache = ConsumerRateLimitCache::new(repo.clone(), &ConsumerCacheConfig::default());
    assert!(cache.get("acme").await?.is_none());

    let policy = Uuid::new_v4();
    repo.put_consumer(consumer("acme", policy, 5));
    cache.invalidate_policy(policy).await;

    let limit = cache.get("acme").await?;
    assert_eq!(limit.map(|l| l.id), Some(policy));
    Ok(())
}

#[tokio::test]
async fn policy_cache_refresh_replaces_and_evicts() -> TestResult {
    let repo = Arc::new(InMemoryRepository::new());
    let id = Uuid::new_v4();
    repo.put_policy(RateLimitPolicy { id, limit: RateLimit::new(10, 20) });
    let policies = PolicyCache::new(repo.clone(), Duration::from_secs(300), 100);

    let cached = policies.get(id).await?.ok_or("policy missing")?;
    assert_eq!(cached.limit, RateLimit::new(10, 20));

    repo.put_policy(RateLimitPolicy { id, limit: RateLimit::new(50, 50) });
    assert_eq!(policies.get(id).await?.map(|p| p.limit), Some(RateLimit::new(10, 20)));

    policies.refresh(id).await?;
    assert_eq!(policies.get(id).await?.map(|p| p.limit), Some(RateLimit::new(50, 50)));

    repo.remove_policy(&id);
    assert!(policies.refresh(id).await?.is_none());
    assert!(policies.get(id).await?.is_none());
    Ok(())
}
