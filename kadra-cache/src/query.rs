//! Get-or-compute query caching.
//!
//! [`QueryCache`] wraps an arbitrary compute function with
//! get-or-compute-and-store semantics. The caller waits for the real result
//! on a miss; the write back to the store happens on a detached task so
//! cache latency never delays the response. Every store failure on this
//! path is recovered fail-open: reads behave as misses, writes are logged
//! and dropped, and the only error a caller can see is its own compute
//! function's.
//!
//! There is deliberately no single-flight de-duplication of concurrent
//! identical misses: two requests racing on the same key both run the
//! compute and both write back the same value. Availability is preferred
//! over saved recomputation here.

use chrono::{DateTime, Utc};
use kadra_core::CacheParams;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::TtlConfig;
use crate::key::CacheKey;
use crate::store::CacheStore;

/// What is physically stored under a cache key.
///
/// The envelope carries enough to validate freshness client-side: an entry
/// is never treated as fresh past its TTL even if the backend has not yet
/// evicted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEnvelope {
    pub inserted_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub payload: serde_json::Value,
}

impl CacheEnvelope {
    fn new(payload: serde_json::Value, ttl: Duration) -> Self {
        Self {
            inserted_at: Utc::now(),
            ttl_seconds: ttl.as_secs().max(1),
            payload,
        }
    }

    /// Whether the entry is still within its TTL.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.inserted_at);
        age >= chrono::Duration::zero() && age.num_seconds() < self.ttl_seconds as i64
    }
}

/// Per-call options for [`QueryCache::get_or_compute`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Skip the cache read, always run the compute, and still write the
    /// fresh result back (refresh-ahead). A caller demanding fresh data
    /// does not starve subsequent cached reads.
    pub force_refresh: bool,
    /// Override the namespace's configured TTL for this entry.
    pub ttl: Option<Duration>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Query cache over an injected [`CacheStore`].
pub struct QueryCache {
    store: Arc<dyn CacheStore>,
    ttls: TtlConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    /// Create a query cache with the engine's TTL table.
    pub fn new(store: Arc<dyn CacheStore>, ttls: TtlConfig) -> Self {
        Self {
            store,
            ttls,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache hits observed by this instance.
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Cache misses observed by this instance (including fail-open reads).
    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get the cached value for `params`, or compute and store it.
    ///
    /// On a hit the compute function is not called. On a miss the caller
    /// awaits `compute` directly, then the result is written back on a
    /// detached task. Compute errors propagate unmodified and are never
    /// cached.
    pub async fn get_or_compute<P, T, E, F, Fut>(
        &self,
        params: &P,
        opts: QueryOptions,
        compute: F,
    ) -> Result<T, E>
    where
        P: CacheParams,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = match CacheKey::for_params(params) {
            Ok(key) => Some(key),
            Err(e) => {
                // Unkeyable params: degrade to a plain compute call.
                tracing::warn!(error = %e, "failed to build cache key, bypassing cache");
                None
            }
        };

        if let Some(key) = &key {
            if !opts.force_refresh {
                if let Some(value) = self.read_fresh::<T>(key).await {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key = %key, "cache hit");
                    return Ok(value);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "cache miss");
            }
        }

        // The caller waits for the real result; only the write-back is
        // detached.
        let value = compute().await?;

        if let Some(key) = key {
            let ttl = opts.ttl.unwrap_or_else(|| self.ttls.ttl_for(key.namespace()));
            self.spawn_write(&key, &value, ttl);
        }

        Ok(value)
    }

    /// Read and validate an envelope. Backend errors, corrupt payloads,
    /// and stale entries all behave as a miss. Corrupt entries are left
    /// in place to be overwritten by the next successful write.
    async fn read_fresh<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let bytes = match self.store.get(key.as_str()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        let envelope: CacheEnvelope = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "corrupt cache entry, treating as miss");
                return None;
            }
        };

        if !envelope.is_fresh(Utc::now()) {
            tracing::debug!(key = %key, "cache entry past TTL, treating as miss");
            return None;
        }

        match serde_json::from_value(envelope.payload) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cached payload shape mismatch, treating as miss");
                None
            }
        }
    }

    /// Fire-and-forget write of a fresh envelope. The request path never
    /// awaits this task; failures are logged and dropped.
    fn spawn_write<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let payload = match serde_json::to_value(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to serialize value, skipping cache write");
                return;
            }
        };

        let envelope = CacheEnvelope::new(payload, ttl);
        let bytes = match serde_json::to_vec(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to encode envelope, skipping cache write");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let key = key.as_str().to_string();
        tokio::spawn(async move {
            if let Err(e) = store.set(&key, bytes, ttl).await {
                tracing::warn!(key = %key, error = %e, "detached cache write dropped");
            }
        });
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("hits", &self.hit_count())
            .field("misses", &self.miss_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use kadra_core::AttendanceStatsParams;
    use std::sync::atomic::AtomicUsize;

    fn params() -> AttendanceStatsParams {
        AttendanceStatsParams {
            user_id: 42,
            period_days: 30,
        }
    }

    async fn wait_for_detached_write(store: &MemoryStore, before: usize) {
        for _ in 0..100 {
            if store.live_key_count().await > before {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("detached cache write never landed");
    }

    #[tokio::test]
    async fn test_miss_computes_then_hit_does_not() {
        let store = Arc::new(MemoryStore::new());
        let cache = QueryCache::new(store.clone(), TtlConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        let first: Result<u64, std::convert::Infallible> = cache
            .get_or_compute(&params(), QueryOptions::new(), || async move {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(1234)
            })
            .await;
        assert_eq!(first.unwrap(), 1234);
        assert_eq!(cache.miss_count(), 1);

        wait_for_detached_write(&store, 0).await;

        let calls_clone = calls.clone();
        let second: Result<u64, std::convert::Infallible> = cache
            .get_or_compute(&params(), QueryOptions::new(), || async move {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(9999)
            })
            .await;
        assert_eq!(second.unwrap(), 1234);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hit_count(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_read_but_writes_back() {
        let store = Arc::new(MemoryStore::new());
        let cache = QueryCache::new(store.clone(), TtlConfig::default());

        let first: Result<u64, std::convert::Infallible> = cache
            .get_or_compute(&params(), QueryOptions::new(), || async { Ok(1) })
            .await;
        assert_eq!(first.unwrap(), 1);
        wait_for_detached_write(&store, 0).await;

        // Bypass read, compute fresh, refresh the stored entry.
        let refreshed: Result<u64, std::convert::Infallible> = cache
            .get_or_compute(&params(), QueryOptions::new().force_refresh(), || async {
                Ok(2)
            })
            .await;
        assert_eq!(refreshed.unwrap(), 2);

        // Wait until the detached refresh write replaces the value.
        for _ in 0..100 {
            let cached: Result<u64, std::convert::Infallible> = cache
                .get_or_compute(&params(), QueryOptions::new(), || async { Ok(0) })
                .await;
            if cached.unwrap() == 2 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("refresh-ahead write never landed");
    }

    #[tokio::test]
    async fn test_compute_error_propagates_uncached() {
        let store = Arc::new(MemoryStore::new());
        let cache = QueryCache::new(store.clone(), TtlConfig::default());

        let result: Result<u64, String> = cache
            .get_or_compute(&params(), QueryOptions::new(), || async {
                Err("db unavailable".to_string())
            })
            .await;
        assert_eq!(result.unwrap_err(), "db unavailable");

        // Nothing was cached; the next call computes again and succeeds.
        let ok: Result<u64, String> = cache
            .get_or_compute(&params(), QueryOptions::new(), || async { Ok(7) })
            .await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_corrupt_entry_treated_as_miss() {
        let store = Arc::new(MemoryStore::new());
        let cache = QueryCache::new(store.clone(), TtlConfig::default());

        let key = CacheKey::for_params(&params()).unwrap();
        crate::store::CacheStore::set(
            store.as_ref(),
            key.as_str(),
            b"{not valid json".to_vec(),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        let result: Result<u64, std::convert::Infallible> = cache
            .get_or_compute(&params(), QueryOptions::new(), || async { Ok(55) })
            .await;
        assert_eq!(result.unwrap(), 55);
        assert_eq!(cache.miss_count(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_falls_through_to_compute() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let cache = QueryCache::new(store.clone(), TtlConfig::default());

        for i in 0..3u64 {
            let result: Result<u64, std::convert::Infallible> = cache
                .get_or_compute(&params(), QueryOptions::new(), move || async move { Ok(i) })
                .await;
            // Always recomputed, never failed.
            assert_eq!(result.unwrap(), i);
        }
        assert_eq!(cache.miss_count(), 3);
    }

    #[tokio::test]
    async fn test_envelope_freshness_window() {
        let envelope = CacheEnvelope::new(serde_json::json!(1), Duration::from_secs(60));
        assert!(envelope.is_fresh(Utc::now()));
        assert!(!envelope.is_fresh(Utc::now() + chrono::Duration::seconds(61)));
    }
}
