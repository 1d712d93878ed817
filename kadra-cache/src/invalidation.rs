//! Tag-driven cache invalidation.
//!
//! After a mutating operation succeeds, the business layer hands the
//! coordinator the tags naming what changed. Each tag expands to key-space
//! patterns which are deleted from the store. Invalidation is best-effort
//! over-deletion: deleting more keys than strictly necessary is expected,
//! deleting fewer never is. A failed pattern is retried once, then logged
//! and skipped; a transiently stale cache is tolerated in favor of
//! availability, with staleness bounded by the entry TTLs.

use kadra_core::InvalidationTag;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::store::CacheStore;

/// Result of one invalidation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationOutcome {
    /// Total keys deleted across all patterns.
    pub keys_deleted: u64,
    /// Patterns that still failed after one retry.
    pub failed_patterns: Vec<String>,
}

impl InvalidationOutcome {
    /// Whether every pattern was deleted successfully.
    pub fn is_complete(&self) -> bool {
        self.failed_patterns.is_empty()
    }
}

/// Maps domain tags to key-space patterns and deletes them from the store.
#[derive(Clone)]
pub struct InvalidationCoordinator {
    store: Arc<dyn CacheStore>,
}

impl InvalidationCoordinator {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Expand `tags` into their de-duplicated pattern set.
    ///
    /// Tags overlap (most reach the dashboard namespace), so expansion goes
    /// through a set to avoid deleting the same pattern twice.
    pub fn expand(tags: &[InvalidationTag]) -> Vec<String> {
        let mut patterns = BTreeSet::new();
        for tag in tags {
            for namespace in tag.namespaces() {
                patterns.insert(namespace.pattern());
            }
        }
        patterns.into_iter().collect()
    }

    /// Delete every pattern the given tags expand to.
    ///
    /// Individual pattern failures are retried once and never abort the
    /// remaining deletions.
    pub async fn invalidate(&self, tags: &[InvalidationTag]) -> InvalidationOutcome {
        let patterns = Self::expand(tags);
        let mut outcome = InvalidationOutcome::default();

        for pattern in patterns {
            match self.delete_with_retry(&pattern).await {
                Some(deleted) => outcome.keys_deleted += deleted,
                None => outcome.failed_patterns.push(pattern),
            }
        }

        tracing::debug!(
            tags = ?tags.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            keys_deleted = outcome.keys_deleted,
            failed = outcome.failed_patterns.len(),
            "invalidation pass complete"
        );
        outcome
    }

    /// The write-completion signal from the business layer.
    ///
    /// Spawns the invalidation on a detached task so it never blocks the
    /// client-visible response of the triggering write. The returned handle
    /// can be awaited by callers that care (tests do); request paths drop
    /// it.
    pub fn notify_write_complete(
        &self,
        tags: Vec<InvalidationTag>,
    ) -> tokio::task::JoinHandle<InvalidationOutcome> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.invalidate(&tags).await })
    }

    async fn delete_with_retry(&self, pattern: &str) -> Option<u64> {
        match self.store.delete_by_pattern(pattern).await {
            Ok(deleted) => return Some(deleted),
            Err(e) => {
                tracing::warn!(pattern, error = %e, "pattern delete failed, retrying once");
            }
        }
        match self.store.delete_by_pattern(pattern).await {
            Ok(deleted) => Some(deleted),
            Err(e) => {
                tracing::warn!(pattern, error = %e, "pattern delete failed after retry, skipping");
                None
            }
        }
    }
}

impl std::fmt::Debug for InvalidationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationCoordinator").finish()
    }
}
