//! Trigger loop driving reconciliation passes.
//!
//! The worker consumes reconcile keys from an in-process channel and runs
//! a periodic full resync over all certificates. Keys are processed
//! sequentially on a single task, which is what guarantees at most one
//! active pass per certificate. A pass failure is logged and counted but
//! never stops the loop; the failed key comes back on a later trigger or
//! resync.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use common::config::PrunerConfig;
use common::store::RecordStore;

use crate::metrics::PruneMetrics;
use crate::reconciler::Reconciler;

const TRIGGER_CHANNEL_SIZE: usize = 1024;

/// Handle for delivering reconcile keys to a running [`PruneWorker`].
///
/// Cloneable; external watchers hold one and call [`notify`] whenever a
/// certificate or one of its issuance records changes.
///
/// [`notify`]: TriggerHandle::notify
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    sender: mpsc::Sender<String>,
}

/// Errors that can occur when delivering a trigger.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// The worker is no longer receiving keys.
    #[error("prune worker is no longer running")]
    Closed,
}

impl TriggerHandle {
    /// Enqueue a `namespace/name` key for reconciliation.
    ///
    /// Duplicate keys are fine; every delivery results in one pass, and a
    /// pass over an already-pruned certificate is a no-op. A key that is
    /// lost because the worker shut down is recovered by the next resync
    /// after restart.
    pub async fn notify(&self, key: impl Into<String>) -> Result<(), TriggerError> {
        self.sender
            .send(key.into())
            .await
            .map_err(|_| TriggerError::Closed)
    }
}

/// Worker that runs reconciliation passes until shut down.
pub struct PruneWorker {
    reconciler: Reconciler,
    store: Arc<dyn RecordStore>,
    config: PrunerConfig,
    metrics: PruneMetrics,
    trigger_rx: mpsc::Receiver<String>,
}

impl PruneWorker {
    /// Create a worker and the trigger handle that feeds it.
    pub fn new(store: Arc<dyn RecordStore>, config: PrunerConfig) -> (Self, TriggerHandle) {
        let metrics = PruneMetrics::new();
        let reconciler =
            Reconciler::new(Arc::clone(&store), metrics.clone()).with_dry_run(config.dry_run);
        let (sender, trigger_rx) = mpsc::channel(TRIGGER_CHANNEL_SIZE);

        (
            Self {
                reconciler,
                store,
                config,
                metrics,
                trigger_rx,
            },
            TriggerHandle { sender },
        )
    }

    /// Metrics shared with the reconciler; snapshot via `summary()`.
    pub fn metrics(&self) -> PruneMetrics {
        self.metrics.clone()
    }

    /// Run until the shutdown signal flips to true or every trigger handle
    /// has been dropped.
    ///
    /// The first resync runs immediately on startup; afterwards resyncs
    /// fire on the configured tick interval and event keys are processed
    /// as they arrive.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);

        tracing::info!(
            tick_interval = ?self.config.tick_interval,
            dry_run = self.config.dry_run,
            watch_namespace = self.config.watch_namespace.as_deref().unwrap_or("<all>"),
            "Prune worker started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow_and_update() {
                        break;
                    }
                }
                maybe_key = self.trigger_rx.recv() => {
                    match maybe_key {
                        Some(key) => self.process_key(&key).await,
                        None => {
                            tracing::debug!("All trigger handles dropped, stopping worker");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.resync().await;
                    self.metrics.summary().log();
                }
            }
        }

        tracing::info!("Prune worker stopped");
    }

    async fn process_key(&self, key: &str) {
        if let Err(err) = self.reconciler.process(key).await {
            tracing::warn!(
                key = %key,
                error = %err,
                "Reconciliation pass failed, will retry on a later trigger"
            );
        }
    }

    /// Run one pass for every known certificate.
    ///
    /// Recovers changes the event path missed; an enumeration failure skips
    /// this cycle and the next tick retries.
    async fn resync(&self) {
        let certificates = match self.store.list_certificates().await {
            Ok(certificates) => certificates,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to enumerate certificates for resync");
                return;
            }
        };

        tracing::debug!(certificates = certificates.len(), "Running resync cycle");

        for certificate in certificates {
            if let Some(namespace) = &self.config.watch_namespace {
                if certificate.namespace != *namespace {
                    continue;
                }
            }
            self.process_key(&certificate.key()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    use common::model::{Certificate, ConditionStatus, IssuanceRecord};
    use common::store::memory::InMemoryStore;

    fn seeded_cert(limit: u32) -> Certificate {
        Certificate::new("testns", "test-cert")
            .with_ready(ConditionStatus::True)
            .with_revision_history_limit(limit)
    }

    async fn seed_records(store: &InMemoryStore, cert: &Certificate) {
        store
            .insert_record(
                IssuanceRecord::new("testns", "cr-1")
                    .owned_by(cert)
                    .with_revision("1"),
            )
            .await;
        store
            .insert_record(
                IssuanceRecord::new("testns", "cr-2")
                    .owned_by(cert)
                    .with_revision("2"),
            )
            .await;
    }

    async fn wait_until<F, Fut>(mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        for _ in 0..200 {
            if condition().await {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within timeout");
    }

    #[tokio::test]
    async fn test_trigger_drives_pruning() {
        let store = InMemoryStore::new();
        let cert = seeded_cert(1);
        store.insert_certificate(cert.clone()).await;
        seed_records(&store, &cert).await;

        let config = PrunerConfig {
            // Long tick so only the trigger can cause the delete after the
            // startup resync is pinned to another namespace.
            tick_interval: Duration::from_secs(3600),
            watch_namespace: Some("otherns".to_string()),
            ..Default::default()
        };
        let (worker, trigger) = PruneWorker::new(Arc::new(store.clone()), config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        trigger.notify("testns/test-cert").await.unwrap();

        wait_until(|| {
            let store = store.clone();
            async move { !store.contains_record("testns", "cr-1").await }
        })
        .await;
        assert!(store.contains_record("testns", "cr-2").await);

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_resync_drives_pruning_without_triggers() {
        let store = InMemoryStore::new();
        let cert = seeded_cert(1);
        store.insert_certificate(cert.clone()).await;
        seed_records(&store, &cert).await;

        let config = PrunerConfig {
            tick_interval: Duration::from_millis(20),
            ..Default::default()
        };
        let (worker, _trigger) = PruneWorker::new(Arc::new(store.clone()), config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        wait_until(|| {
            let store = store.clone();
            async move { !store.contains_record("testns", "cr-1").await }
        })
        .await;
        assert!(store.contains_record("testns", "cr-2").await);

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_resync_honors_watch_namespace() {
        let store = InMemoryStore::new();
        let cert = seeded_cert(1);
        store.insert_certificate(cert.clone()).await;
        seed_records(&store, &cert).await;

        let config = PrunerConfig {
            tick_interval: Duration::from_millis(20),
            watch_namespace: Some("otherns".to_string()),
            ..Default::default()
        };
        let (worker, _trigger) = PruneWorker::new(Arc::new(store.clone()), config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        // Give several resync cycles a chance to run.
        sleep(Duration::from_millis(100)).await;
        assert_eq!(store.record_names("testns").await.len(), 2);

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stale_keys_do_not_stop_the_worker() {
        let store = InMemoryStore::new();
        let cert = seeded_cert(1);
        store.insert_certificate(cert.clone()).await;
        seed_records(&store, &cert).await;

        let config = PrunerConfig {
            tick_interval: Duration::from_secs(3600),
            watch_namespace: Some("otherns".to_string()),
            ..Default::default()
        };
        let (worker, trigger) = PruneWorker::new(Arc::new(store.clone()), config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        // Stale and malformed keys are clean no-ops.
        trigger.notify("testns/deleted-cert").await.unwrap();
        trigger.notify("not-a-key").await.unwrap();
        trigger.notify("testns/test-cert").await.unwrap();

        wait_until(|| {
            let store = store.clone();
            async move { !store.contains_record("testns", "cr-1").await }
        })
        .await;

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_worker_stops_when_all_trigger_handles_drop() {
        let store = InMemoryStore::new();
        let config = PrunerConfig {
            tick_interval: Duration::from_secs(3600),
            ..Default::default()
        };
        let (worker, trigger) = PruneWorker::new(Arc::new(store), config);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        drop(trigger);

        timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
