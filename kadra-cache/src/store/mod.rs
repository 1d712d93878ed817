//! Cache store abstraction and backends.
//!
//! [`CacheStore`] is a thin contract over a networked key-value backend. It
//! carries no business knowledge: keys are opaque strings, values are opaque
//! bytes. Implementations report failures truthfully through
//! [`CacheResult`]; fail-open recovery is the consumers' responsibility so
//! the health monitor can still observe backend trouble.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use kadra_core::CacheResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use memory::MemoryStore;
pub use redis::RedisStore;

/// Statistics about cache usage, suitable for an operational dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits observed by this process.
    pub hits: u64,
    /// Number of cache misses observed by this process.
    pub misses: u64,
    /// Total backend operations issued by this process.
    pub operations: u64,
    /// Whether the backend answered the most recent stats probe.
    pub connected: bool,
    /// Backend memory usage in bytes, as reported by the backend.
    pub memory_bytes: u64,
    /// Number of keys currently in the backend.
    pub key_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Contract for a networked key-value cache backend.
///
/// All operations are async and bounded: implementations must not block the
/// caller beyond their configured timeout. `increment` and
/// `delete_by_pattern` rely on the backend's own atomicity; nothing in this
/// process coordinates concurrent access.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the value stored under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store `value` under `key` with the given TTL. Overwrites any
    /// existing value and resets its TTL.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;

    /// Delete a single key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Delete every key matching a glob pattern (`*` wildcard), returning
    /// the number of keys removed. Deletion proceeds in small batches; a
    /// concurrent reader may observe a partially-deleted pattern window no
    /// larger than one batch.
    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64>;

    /// Atomically increment the integer counter under `key`, returning the
    /// new value. When the increment creates the counter (result is 1) the
    /// TTL is set to `ttl_if_new`; subsequent increments leave the TTL
    /// untouched.
    async fn increment(&self, key: &str, ttl_if_new: Duration) -> CacheResult<i64>;

    /// Remaining TTL for `key`, or `None` if the key is absent or has no
    /// expiry.
    async fn ttl_remaining(&self, key: &str) -> CacheResult<Option<Duration>>;

    /// Probe backend connectivity.
    async fn ping(&self) -> CacheResult<()>;

    /// Usage statistics combining backend-reported figures with
    /// process-local hit/miss counters.
    async fn stats(&self) -> CacheResult<CacheStats>;
}
