//! Engine assembly.
//!
//! [`CacheEngine`] owns one store and hands out the components built over
//! it. Application code constructs the engine once at startup and clones
//! the component handles into whatever state struct its framework uses.

use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::health::{HealthMonitor, HealthMonitorHandle};
use crate::invalidation::InvalidationCoordinator;
use crate::query::QueryCache;
use crate::rate_limit::RateLimiter;
use crate::store::{CacheStore, MemoryStore, RedisStore};
use kadra_core::CacheResult;

/// The assembled caching engine: one store, all components over it.
pub struct CacheEngine {
    store: Arc<dyn CacheStore>,
    queries: Arc<QueryCache>,
    invalidation: InvalidationCoordinator,
    rate_limiter: RateLimiter,
    health: HealthMonitor,
    health_interval: Duration,
}

impl CacheEngine {
    /// Connect to the Redis backend named by `config` and assemble the
    /// engine over it.
    pub async fn connect(config: EngineConfig) -> CacheResult<Self> {
        let store = Arc::new(RedisStore::connect(&config.redis).await?);
        Ok(Self::with_store(store, config))
    }

    /// Assemble the engine over an in-process store. Used in tests and in
    /// deployments that run without a Redis backend.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), config)
    }

    /// Assemble the engine over any store implementation.
    pub fn with_store(store: Arc<dyn CacheStore>, config: EngineConfig) -> Self {
        let queries = Arc::new(QueryCache::new(Arc::clone(&store), config.ttls.clone()));
        let invalidation = InvalidationCoordinator::new(Arc::clone(&store));
        let rate_limiter = RateLimiter::new(Arc::clone(&store), config.rate_limits.clone());
        let health = HealthMonitor::new(Arc::clone(&store));

        Self {
            store,
            queries,
            invalidation,
            rate_limiter,
            health,
            health_interval: config.health_interval,
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn queries(&self) -> &Arc<QueryCache> {
        &self.queries
    }

    pub fn invalidation(&self) -> &InvalidationCoordinator {
        &self.invalidation
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Start the periodic health probe at the configured interval.
    pub fn spawn_health_monitor(&self) -> HealthMonitorHandle {
        self.health.spawn(self.health_interval)
    }
}

impl std::fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("health_interval", &self.health_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_components_share_one_store() {
        let engine = CacheEngine::in_memory(EngineConfig::default());

        engine
            .store()
            .set("users:a", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        // The health monitor sees the key written through the store handle.
        let report = engine.health().check().await;
        assert_eq!(report.stats.key_count, 1);
    }
}
