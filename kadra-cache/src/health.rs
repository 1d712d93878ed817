//! Backend health probing and usage statistics.
//!
//! The monitor is purely observational: a failed ping marks the report
//! disconnected, but nothing gates further store calls on it. Every
//! consumer stays in fail-open mode regardless. The report feeds readiness
//! checks and the admin dashboard's cache panel (hit rate, key count,
//! memory, connected flag).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::store::{CacheStats, CacheStore};

/// A snapshot of backend health and usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Whether the most recent ping succeeded.
    pub connected: bool,
    /// Ping round-trip latency, when connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// The ping failure, when disconnected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Usage statistics. Zeroed when the stats probe itself failed.
    pub stats: CacheStats,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    fn unknown() -> Self {
        Self {
            connected: false,
            latency_ms: None,
            error: Some("not probed yet".to_string()),
            stats: CacheStats::default(),
            checked_at: Utc::now(),
        }
    }
}

/// Periodic and on-demand connectivity probe for the cache backend.
#[derive(Clone)]
pub struct HealthMonitor {
    store: Arc<dyn CacheStore>,
}

impl HealthMonitor {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Probe the backend once: ping, then best-effort stats.
    pub async fn check(&self) -> HealthReport {
        let started = tokio::time::Instant::now();

        let (connected, latency_ms, error) = match self.store.ping().await {
            Ok(()) => (true, Some(started.elapsed().as_millis() as u64), None),
            Err(e) => (false, None, Some(e.to_string())),
        };

        // Stats are best-effort even when the ping succeeded.
        let stats = match self.store.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::debug!(error = %e, "stats probe failed");
                CacheStats {
                    connected: false,
                    ..CacheStats::default()
                }
            }
        };

        HealthReport {
            connected,
            latency_ms,
            error,
            stats,
            checked_at: Utc::now(),
        }
    }

    /// Run the probe on a fixed interval until the handle is shut down.
    ///
    /// The latest report is published through a watch channel so readiness
    /// checks and the dashboard read it without issuing their own probes.
    /// Connectivity transitions are logged once per flip, not per tick.
    pub fn spawn(&self, probe_interval: Duration) -> HealthMonitorHandle {
        let (report_tx, report_rx) = watch::channel(HealthReport::unknown());
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let monitor = self.clone();

        let task = tokio::spawn(async move {
            tracing::info!(interval_secs = probe_interval.as_secs(), "health probe started");
            let mut ticker = interval(probe_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut was_connected: Option<bool> = None;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = monitor.check().await;

                        match (was_connected, report.connected) {
                            (Some(false) | None, true) => {
                                tracing::info!(latency_ms = ?report.latency_ms, "cache backend connected");
                            }
                            (Some(true) | None, false) => {
                                tracing::warn!(error = ?report.error, "cache backend disconnected");
                            }
                            _ => {}
                        }
                        was_connected = Some(report.connected);

                        // Receivers may all be gone; keep probing anyway so
                        // late subscribers get a current report.
                        let _ = report_tx.send(report);
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("health probe stopped");
                            break;
                        }
                    }
                }
            }
        });

        HealthMonitorHandle {
            report_rx,
            shutdown_tx,
            task,
        }
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor").finish()
    }
}

/// Handle to a running periodic health probe.
pub struct HealthMonitorHandle {
    report_rx: watch::Receiver<HealthReport>,
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl HealthMonitorHandle {
    /// The most recently published report.
    pub fn latest(&self) -> HealthReport {
        self.report_rx.borrow().clone()
    }

    /// Subscribe to report updates.
    pub fn subscribe(&self) -> watch::Receiver<HealthReport> {
        self.report_rx.clone()
    }

    /// Stop the probe task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_check_reports_connected_with_stats() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("users:a", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let report = HealthMonitor::new(store).check().await;
        assert!(report.connected);
        assert!(report.latency_ms.is_some());
        assert!(report.error.is_none());
        assert_eq!(report.stats.key_count, 1);
    }

    #[tokio::test]
    async fn test_check_reports_disconnected_on_ping_failure() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);

        let report = HealthMonitor::new(store).check().await;
        assert!(!report.connected);
        assert!(report.latency_ms.is_none());
        assert!(report.error.is_some());
        assert_eq!(report.stats.key_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_probe_publishes_and_shuts_down() {
        let store = Arc::new(MemoryStore::new());
        let handle = HealthMonitor::new(store.clone()).spawn(Duration::from_secs(30));

        let mut rx = handle.subscribe();
        // First tick fires immediately.
        rx.changed().await.unwrap();
        assert!(handle.latest().connected);

        // Flip the backend down and wait for the next tick to observe it.
        store.set_unavailable(true);
        rx.changed().await.unwrap();
        assert!(!handle.latest().connected);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_report_serializes_for_dashboard() {
        let store = Arc::new(MemoryStore::new());
        let report = HealthMonitor::new(store).check().await;
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"connected\":true"));
        assert!(json.contains("\"stats\""));
    }
}
