//! certkeep pruning engine
//!
//! Enforces per-certificate retention of issuance records:
//! - Pure revision extraction and stable ordering of records
//! - Single-pass reconciliation that deletes the oldest surplus records
//! - A trigger-driven worker loop with periodic full resyncs
//! - Thread-safe metrics tracking across passes

pub mod metrics;
pub mod reconciler;
pub mod revision;
pub mod worker;

// Re-export commonly used types
pub use metrics::{MetricsSummary, PruneMetrics};
pub use reconciler::{PruneError, Reconciler};
pub use revision::{Revision, extract_and_sort};
pub use worker::{PruneWorker, TriggerError, TriggerHandle};
