//! End-to-end engine scenarios over the in-memory store.

use kadra_cache::{
    CacheEngine, CacheStore, EngineConfig, EndpointClass, InvalidationTag, MemoryStore,
    QueryOptions, RateLimitConfig,
};
use kadra_core::AttendanceStatsParams;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn stats_params() -> AttendanceStatsParams {
    AttendanceStatsParams {
        user_id: 7,
        period_days: 30,
    }
}

async fn wait_for_keys(store: &MemoryStore, at_least: usize) {
    for _ in 0..200 {
        if store.live_key_count().await >= at_least {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("detached cache write never landed");
}

fn engine_over(store: Arc<MemoryStore>) -> CacheEngine {
    CacheEngine::with_store(store, EngineConfig::default())
}

#[tokio::test]
async fn test_cold_read_computes_and_repeat_read_hits() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_over(store.clone());
    let compute_calls = Arc::new(AtomicUsize::new(0));

    let calls = compute_calls.clone();
    let first: Result<Vec<u32>, Infallible> = engine
        .queries()
        .get_or_compute(&stats_params(), QueryOptions::new(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![8, 9, 10])
        })
        .await;
    assert_eq!(first.unwrap(), vec![8, 9, 10]);
    assert_eq!(compute_calls.load(Ordering::SeqCst), 1);

    wait_for_keys(&store, 1).await;

    // Same parameters again: served from cache, the compute never runs.
    let calls = compute_calls.clone();
    let second: Result<Vec<u32>, Infallible> = engine
        .queries()
        .get_or_compute(&stats_params(), QueryOptions::new(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0])
        })
        .await;
    assert_eq!(second.unwrap(), vec![8, 9, 10]);
    assert_eq!(compute_calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.queries().hit_count(), 1);
}

#[tokio::test]
async fn test_write_invalidation_forces_recompute() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_over(store.clone());

    let warm: Result<u64, Infallible> = engine
        .queries()
        .get_or_compute(&stats_params(), QueryOptions::new(), || async { Ok(160) })
        .await;
    assert_eq!(warm.unwrap(), 160);
    wait_for_keys(&store, 1).await;

    // An attendance correction lands; the stats namespace is swept.
    let outcome = engine
        .invalidation()
        .notify_write_complete(vec![InvalidationTag::AttendanceRecords])
        .await
        .unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.keys_deleted, 1);

    let fresh: Result<u64, Infallible> = engine
        .queries()
        .get_or_compute(&stats_params(), QueryOptions::new(), || async { Ok(168) })
        .await;
    assert_eq!(fresh.unwrap(), 168);
}

#[tokio::test(start_paused = true)]
async fn test_entry_expires_with_backend_ttl() {
    let engine = CacheEngine::in_memory(EngineConfig::default());

    engine
        .store()
        .set("test:ttl", b"value".to_vec(), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(
        engine.store().get("test:ttl").await.unwrap(),
        Some(b"value".to_vec())
    );

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(engine.store().get("test:ttl").await.unwrap(), None);
}

#[tokio::test]
async fn test_login_burst_rejected_after_threshold() {
    let store = Arc::new(MemoryStore::new());
    let config = EngineConfig {
        rate_limits: RateLimitConfig::default().with_limit(
            EndpointClass::Login,
            100,
            Duration::from_secs(900),
        ),
        ..EngineConfig::default()
    };
    let engine = CacheEngine::with_store(store, config);

    for i in 0..100u32 {
        let decision = engine.rate_limiter().allow_class("10.0.0.1", EndpointClass::Login).await;
        assert!(decision.allowed, "attempt {} should pass", i + 1);
    }

    let rejected = engine.rate_limiter().allow_class("10.0.0.1", EndpointClass::Login).await;
    assert!(!rejected.allowed);
    let retry_after = rejected.retry_after.unwrap();
    assert!(retry_after <= Duration::from_secs(900));

    // A different client is unaffected.
    assert!(
        engine
            .rate_limiter()
            .allow_class("10.0.0.2", EndpointClass::Login)
            .await
            .allowed
    );
}

#[tokio::test]
async fn test_dead_backend_degrades_without_errors() {
    let store = Arc::new(MemoryStore::new());
    store.set_unavailable(true);
    let engine = engine_over(store.clone());

    // Queries recompute every time but always return the right value.
    for round in 0..3u64 {
        let result: Result<u64, Infallible> = engine
            .queries()
            .get_or_compute(&stats_params(), QueryOptions::new(), move || async move {
                Ok(round * 100)
            })
            .await;
        assert_eq!(result.unwrap(), round * 100);
    }

    // Invalidation reports its failures without aborting or panicking.
    let outcome = engine
        .invalidation()
        .notify_write_complete(vec![InvalidationTag::Users])
        .await
        .unwrap();
    assert!(!outcome.is_complete());

    // Rate limiting fails open.
    let decision = engine
        .rate_limiter()
        .allow_class("10.0.0.1", EndpointClass::Login)
        .await;
    assert!(decision.allowed);

    // The health monitor is the one place the outage is visible.
    let report = engine.health().check().await;
    assert!(!report.connected);
    assert!(report.error.is_some());
}

#[tokio::test]
async fn test_parameter_field_order_does_not_split_the_cache() {
    // Two param structs serializing the same fields in different declaration
    // order must share a key; the canonical form is order-insensitive.
    use kadra_cache::CacheKey;
    use kadra_core::{CacheParams, Namespace};
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Forward {
        user_id: i64,
        period_days: u32,
    }
    impl CacheParams for Forward {
        const NAMESPACE: Namespace = Namespace::AttendanceStats;
    }

    #[derive(Serialize, Deserialize)]
    struct Backward {
        period_days: u32,
        user_id: i64,
    }
    impl CacheParams for Backward {
        const NAMESPACE: Namespace = Namespace::AttendanceStats;
    }

    let a = CacheKey::for_params(&Forward {
        user_id: 7,
        period_days: 30,
    })
    .unwrap();
    let b = CacheKey::for_params(&Backward {
        period_days: 30,
        user_id: 7,
    })
    .unwrap();
    assert_eq!(a.as_str(), b.as_str());
}
