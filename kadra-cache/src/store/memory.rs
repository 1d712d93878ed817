//! In-memory cache store.
//!
//! A process-local [`CacheStore`] for tests and single-node development.
//! TTLs are tracked against `tokio::time::Instant`, so tests running under
//! a paused clock can advance time deterministically. The store can also
//! simulate a total backend outage via [`MemoryStore::set_unavailable`],
//! which makes every operation fail with a connection error, the shape the
//! engine's fail-open paths are written against.

use async_trait::async_trait;
use kadra_core::{CacheResult, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory implementation of [`CacheStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    operations: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend becoming unreachable (or reachable again).
    /// While unavailable, every operation returns a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> CacheResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::connection("simulated backend outage"))
        } else {
            Ok(())
        }
    }

    fn count_op(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of live (unexpired) keys. Test helper.
    pub async fn live_key_count(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }
}

#[async_trait]
impl super::CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.check_available()?;
        self.count_op();
        let now = Instant::now();

        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value.clone()))
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        self.check_available()?;
        self.count_op();
        let entry = MemoryEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.check_available()?;
        self.count_op();
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.check_available()?;
        self.count_op();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !glob_match(pattern, key));
        Ok((before - entries.len()) as u64)
    }

    async fn increment(&self, key: &str, ttl_if_new: Duration) -> CacheResult<i64> {
        self.check_available()?;
        self.count_op();
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let current = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let text = std::str::from_utf8(&entry.value)
                    .map_err(|_| StoreError::protocol("counter value is not utf-8"))?;
                let n: i64 = text
                    .parse()
                    .map_err(|_| StoreError::protocol("counter value is not an integer"))?;
                Some((n, entry.expires_at))
            }
            _ => None,
        };

        match current {
            Some((n, expires_at)) => {
                let next = n + 1;
                entries.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: next.to_string().into_bytes(),
                        // Existing counter keeps its window.
                        expires_at,
                    },
                );
                Ok(next)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: b"1".to_vec(),
                        expires_at: now + ttl_if_new,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn ttl_remaining(&self, key: &str) -> CacheResult<Option<Duration>> {
        self.check_available()?;
        self.count_op();
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.expires_at - now))
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check_available()?;
        self.count_op();
        Ok(())
    }

    async fn stats(&self) -> CacheResult<super::CacheStats> {
        self.check_available()?;
        self.count_op();
        let now = Instant::now();
        let entries = self.entries.read().await;
        let live: Vec<_> = entries.values().filter(|e| !e.is_expired(now)).collect();

        Ok(super::CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            operations: self.operations.load(Ordering::Relaxed),
            connected: true,
            memory_bytes: live.iter().map(|e| e.value.len() as u64).sum(),
            key_count: live.len() as u64,
        })
    }
}

/// Match a key against a glob pattern supporting `*` wildcards, consistent
/// with the backend's native MATCH semantics for the subset we emit.
pub(crate) fn glob_match(pattern: &str, key: &str) -> bool {
    fn matches(p: &[u8], k: &[u8]) -> bool {
        match (p.first(), k.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                // Star matches zero or more bytes.
                matches(&p[1..], k) || (!k.is_empty() && matches(p, &k[1..]))
            }
            (Some(pc), Some(kc)) if pc == kc => matches(&p[1..], &k[1..]),
            _ => false,
        }
    }
    matches(pattern.as_bytes(), key.as_bytes())
}
