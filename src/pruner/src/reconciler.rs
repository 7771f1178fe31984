//! Single-pass reconciliation that prunes surplus issuance records.
//!
//! Each pass recomputes its decision entirely from freshly fetched state:
//! there is no cursor and no memory of earlier passes, so a retried or
//! duplicated trigger converges to the same terminal state. The deletion
//! set is always the oldest-revisions prefix of the stably sorted record
//! sequence.
//!
//! ## Safety Guarantees
//!
//! - Pruning only runs for certificates in a `Ready=True` state
//! - Certificates without a retention limit are never pruned
//! - Records with unparseable revisions or foreign owners are never touched
//! - Dry-run mode logs decisions without issuing deletes

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use common::model::{IssuanceRecord, NamespacedName};
use common::store::{RecordStore, StoreError};

use crate::metrics::PruneMetrics;
use crate::revision::{Revision, extract_and_sort};

/// Errors surfaced by a reconciliation pass.
///
/// Only store fetch/delete failures reach this type; stale keys, gate
/// conditions, and malformed record data all resolve to a clean no-op.
#[derive(Debug, Error)]
pub enum PruneError {
    /// A fetch or delete against the record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reconciler for a certificate's issuance-record retention.
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    metrics: PruneMetrics,
    dry_run: bool,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RecordStore>, metrics: PruneMetrics) -> Self {
        Self {
            store,
            metrics,
            dry_run: false,
        }
    }

    /// Log pruning decisions without issuing deletes.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run one pruning pass for the certificate identified by `key`.
    ///
    /// An empty, malformed, or stale key is a no-op, not an error; the
    /// trigger may legitimately deliver keys for certificates deleted
    /// between enqueue and processing. Store failures propagate to the
    /// caller, which is expected to retry via a future trigger.
    pub async fn process(&self, key: &str) -> Result<(), PruneError> {
        let started = Instant::now();
        let result = self.run_pass(key).await;

        match &result {
            Ok(()) => self.metrics.record_pass_completed(started.elapsed()),
            Err(_) => self.metrics.record_pass_failed(started.elapsed()),
        }

        result
    }

    async fn run_pass(&self, key: &str) -> Result<(), PruneError> {
        let Some(target) = NamespacedName::parse_key(key) else {
            tracing::debug!(key = %key, "Ignoring empty or malformed reconcile key");
            return Ok(());
        };

        let Some(certificate) = self
            .store
            .get_certificate(&target.namespace, &target.name)
            .await?
        else {
            tracing::debug!(certificate = %target, "Certificate no longer exists, nothing to prune");
            return Ok(());
        };

        // Pruning only runs once an issuance has completed; records of an
        // in-flight issuance might still be needed.
        if !certificate.is_ready() {
            tracing::debug!(
                certificate = %target,
                ready = %certificate.ready,
                "Certificate is not in a Ready=True state, skipping pruning"
            );
            return Ok(());
        }

        let Some(limit) = certificate.revision_history_limit else {
            tracing::debug!(
                certificate = %target,
                "No revision history limit set, retaining all records"
            );
            return Ok(());
        };

        let records = self.store.list_records(&target.namespace).await?;
        let owned: Vec<IssuanceRecord> = records
            .into_iter()
            .filter(|record| record.is_owned_by(&certificate))
            .collect();

        self.metrics.record_records_evaluated(owned.len());

        let sorted = extract_and_sort(&owned);
        self.metrics
            .record_records_skipped(owned.len() - sorted.len());

        let surplus = sorted.len().saturating_sub(limit as usize);
        if surplus == 0 {
            tracing::debug!(
                certificate = %target,
                records = sorted.len(),
                limit,
                "Record count within retention limit"
            );
            return Ok(());
        }

        tracing::info!(
            certificate = %target,
            records = sorted.len(),
            limit,
            surplus,
            dry_run = self.dry_run,
            "Pruning surplus issuance records"
        );

        // Oldest first; the deletion set is a prefix of the sorted sequence.
        for revision in sorted.iter().take(surplus) {
            self.delete_record(revision).await?;
        }

        Ok(())
    }

    /// Delete a single surplus record.
    ///
    /// A record that is already gone counts as deleted; another writer or
    /// an earlier retried pass got there first. Any other failure aborts
    /// the pass. Deletes already issued stand, and the next pass recomputes
    /// the surplus from scratch.
    async fn delete_record(&self, revision: &Revision<'_>) -> Result<(), PruneError> {
        let record = revision.record;

        if self.dry_run {
            tracing::info!(
                record = %record,
                rev = revision.rev,
                "[DRY-RUN] Would delete issuance record"
            );
            self.metrics.record_records_deleted(1);
            return Ok(());
        }

        match self
            .store
            .delete_record(&record.namespace, &record.name)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    record = %record,
                    rev = revision.rev,
                    "Deleted issuance record"
                );
                self.metrics.record_records_deleted(1);
                Ok(())
            }
            Err(StoreError::NotFound { .. }) => {
                tracing::debug!(
                    record = %record,
                    "Issuance record already gone, treating delete as complete"
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    record = %record,
                    error = %err,
                    "Failed to delete issuance record"
                );
                self.metrics.record_delete_failure();
                Err(err.into())
            }
        }
    }
}
