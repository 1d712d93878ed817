//! Redis-backed cache store.
//!
//! Uses a multiplexed [`ConnectionManager`] so concurrent requests share one
//! connection that reconnects itself after failures. Every round-trip is
//! wrapped in a bounded timeout; the store never blocks a request task
//! longer than the configured operation timeout.
//!
//! Pattern deletion walks the key space with incremental `SCAN`/`MATCH` and
//! removes each batch with `UNLINK`, so a concurrent reader never observes a
//! half-deleted window larger than one scan batch.

use async_trait::async_trait;
use kadra_core::{CacheResult, StoreError};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RedisConfig;

/// Keys examined per SCAN iteration. Bounds the size of the window a
/// concurrent reader can observe mid-deletion.
const SCAN_BATCH: usize = 100;

#[derive(Debug, Default)]
struct StoreCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    operations: AtomicU64,
}

/// Redis implementation of [`CacheStore`](super::CacheStore).
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    op_timeout: Duration,
    counters: Arc<StoreCounters>,
}

impl RedisStore {
    /// Connect to the backend described by `config`.
    ///
    /// The initial connection is itself bounded by the operation timeout so
    /// a down backend cannot stall startup indefinitely.
    pub async fn connect(config: &RedisConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(StoreError::connection)?;

        let conn = tokio::time::timeout(config.op_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout {
                timeout: config.op_timeout,
            })?
            .map_err(StoreError::connection)?;

        tracing::info!(url = %config.url, "connected to cache backend");

        Ok(Self {
            conn,
            op_timeout: config.op_timeout,
            counters: Arc::new(StoreCounters::default()),
        })
    }

    /// Run a backend future under the operation timeout, mapping both the
    /// timeout and the client error into the shared taxonomy.
    async fn bounded<T, F>(&self, fut: F) -> CacheResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        self.counters.operations.fetch_add(1, Ordering::Relaxed);
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(map_redis_error(e)),
            Err(_) => Err(StoreError::Timeout {
                timeout: self.op_timeout,
            }),
        }
    }
}

fn map_redis_error(e: redis::RedisError) -> StoreError {
    if e.is_timeout() || e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
        StoreError::connection(e)
    } else {
        StoreError::protocol(e)
    }
}

/// TTLs are expressed to Redis in whole seconds; sub-second requests round
/// up so an entry is never stored without an expiry.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl super::CacheStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = self.bounded(conn.get(key)).await?;
        match &value {
            Some(_) => self.counters.hits.fetch_add(1, Ordering::Relaxed),
            None => self.counters.misses.fetch_add(1, Ordering::Relaxed),
        };
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        self.bounded(conn.set_ex(key, value, ttl_secs(ttl))).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        self.bounded(conn.del(key)).await
    }

    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut deleted: u64 = 0;
        let mut cursor: u64 = 0;

        loop {
            let mut conn = self.conn.clone();
            let scan = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .clone();
            let (next_cursor, batch): (u64, Vec<String>) =
                self.bounded(async move { scan.query_async(&mut conn).await }).await?;

            if !batch.is_empty() {
                let mut conn = self.conn.clone();
                let unlink = redis::cmd("UNLINK").arg(&batch).clone();
                let removed: u64 =
                    self.bounded(async move { unlink.query_async(&mut conn).await }).await?;
                deleted += removed;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        tracing::debug!(pattern, deleted, "pattern delete complete");
        Ok(deleted)
    }

    async fn increment(&self, key: &str, ttl_if_new: Duration) -> CacheResult<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = self.bounded(conn.incr(key, 1i64)).await?;

        // The window TTL belongs to the increment that created the counter.
        if count == 1 {
            let mut conn = self.conn.clone();
            let _: bool = self
                .bounded(conn.expire(key, ttl_secs(ttl_if_new) as i64))
                .await?;
        }

        Ok(count)
    }

    async fn ttl_remaining(&self, key: &str) -> CacheResult<Option<Duration>> {
        let mut conn = self.conn.clone();
        let secs: i64 = self.bounded(conn.ttl(key)).await?;
        // -2: key absent; -1: key has no expiry.
        if secs < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_secs(secs as u64)))
        }
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let ping = redis::cmd("PING").clone();
        let _: String = self.bounded(async move { ping.query_async(&mut conn).await }).await?;
        Ok(())
    }

    async fn stats(&self) -> CacheResult<super::CacheStats> {
        let mut conn = self.conn.clone();
        let dbsize = redis::cmd("DBSIZE").clone();
        let key_count: u64 =
            self.bounded(async move { dbsize.query_async(&mut conn).await }).await?;

        let mut conn = self.conn.clone();
        let info = redis::cmd("INFO").arg("memory").clone();
        let memory_info: String =
            self.bounded(async move { info.query_async(&mut conn).await }).await?;

        Ok(super::CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            operations: self.counters.operations.load(Ordering::Relaxed),
            connected: true,
            memory_bytes: parse_used_memory(&memory_info).unwrap_or(0),
            key_count,
        })
    }
}

/// Extract `used_memory:<bytes>` from an `INFO memory` reply.
fn parse_used_memory(info: &str) -> Option<u64> {
    info.lines()
        .find_map(|line| line.strip_prefix("used_memory:"))
        .and_then(|v| v.trim().parse().ok())
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_used_memory() {
        let info = "# Memory\r\nused_memory:1048576\r\nused_memory_human:1.00M\r\n";
        assert_eq!(parse_used_memory(info), Some(1_048_576));
        assert_eq!(parse_used_memory("# Memory\r\n"), None);
    }

    #[test]
    fn test_ttl_rounds_up_to_one_second() {
        assert_eq!(ttl_secs(Duration::from_millis(100)), 1);
        assert_eq!(ttl_secs(Duration::from_secs(30)), 30);
    }

    #[test]
    fn test_error_mapping_keeps_protocol_errors_distinct() {
        let err = redis::RedisError::from((redis::ErrorKind::TypeError, "WRONGTYPE"));
        assert!(!map_redis_error(err).is_connectivity());
    }
}
