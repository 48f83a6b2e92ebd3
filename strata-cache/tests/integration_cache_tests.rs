use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use strata_cache::{Cache, CacheConfig, CacheRegistry, MemoryStrategy, StackOptions};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

fn memory_registry() -> CacheRegistry {
    CacheRegistry::new(
        Arc::new(MemoryStrategy::new()),
        None,
        StackOptions::default(),
    )
}

#[tokio::test]
async fn test_set_get_without_ttl_is_unbounded() {
    init_logging();
    let registry = memory_registry();
    let cache: Cache<String> = registry.namespace("users");

    cache.set("42", &"alice".to_string(), None).await.unwrap();

    assert_eq!(cache.get("42").await.unwrap(), Some("alice".to_string()));
    // Still there on repeated reads
    assert_eq!(cache.get("42").await.unwrap(), Some("alice".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_ttl_entry_expires() {
    let registry = memory_registry();
    let cache: Cache<String> = registry.namespace("tokens");

    cache
        .set("t", &"opaque".to_string(), Some(Duration::from_secs(10)))
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(9)).await;
    assert_eq!(cache.get("t").await.unwrap(), Some("opaque".to_string()));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(cache.get("t").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_session_scenario() {
    // set("session", "abc123", {"user": "42"}, ttl=5s)
    let registry = memory_registry();
    let sessions: Cache<serde_json::Value> = registry.namespace("session");

    sessions
        .set("abc123", &json!({"user": "42"}), Some(Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(
        sessions.get("abc123").await.unwrap(),
        Some(json!({"user": "42"}))
    );

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(sessions.get("abc123").await.unwrap(), None);
}

#[tokio::test]
async fn test_namespace_isolation() {
    let registry = memory_registry();
    let ns1: Cache<String> = registry.namespace("ns1");
    let ns2: Cache<String> = registry.namespace("ns2");

    ns1.set("k", &"v1".to_string(), None).await.unwrap();
    ns2.set("k", &"v2".to_string(), None).await.unwrap();

    assert_eq!(ns1.get("k").await.unwrap(), Some("v1".to_string()));
    assert_eq!(ns2.get("k").await.unwrap(), Some("v2".to_string()));
}

#[tokio::test]
async fn test_delete_absent_key_succeeds() {
    let registry = memory_registry();
    let cache: Cache<String> = registry.namespace("ns");

    cache.delete("never-written").await.unwrap();
}

#[tokio::test]
async fn test_overwrite_updates_value() {
    let registry = memory_registry();
    let cache: Cache<u64> = registry.namespace("counters");

    cache.set("k", &1, None).await.unwrap();
    cache.set("k", &2, None).await.unwrap();

    assert_eq!(cache.get("k").await.unwrap(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_set_with_ttl_returns_immediately() {
    // A TTL write must not hold the caller for the TTL duration
    let registry = memory_registry();
    let cache: Cache<String> = registry.namespace("ns");

    let before = tokio::time::Instant::now();
    cache
        .set("k", &"v".to_string(), Some(Duration::from_secs(3600)))
        .await
        .unwrap();
    assert_eq!(tokio::time::Instant::now(), before);
}

#[tokio::test]
async fn test_registry_from_config_end_to_end() {
    let registry = CacheRegistry::from_config(&CacheConfig::default()).unwrap();
    let cache: Cache<Vec<u32>> = registry.namespace("lists");

    cache.set("fib", &vec![1, 1, 2, 3, 5], None).await.unwrap();
    assert_eq!(cache.get("fib").await.unwrap(), Some(vec![1, 1, 2, 3, 5]));

    let stats = registry.stats();
    assert_eq!(stats.sets, 1);
    assert_eq!(stats.l1_hits, 1);
    assert!((stats.hit_rate() - 1.0).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_reclaims_expired_entries() {
    let registry = CacheRegistry::from_config(&CacheConfig::default()).unwrap();
    let cache: Cache<String> = registry.namespace("ns");

    cache
        .set("k", &"v".to_string(), Some(Duration::from_secs(1)))
        .await
        .unwrap();

    // The 100 ms sweeper evicts the entry without any read touching it
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(cache.get("k").await.unwrap(), None);
}
