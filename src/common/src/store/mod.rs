//! Storage-facing contract for certificates and issuance records.
//!
//! The pruner never talks to a concrete transport directly; it consumes
//! this trait. Production deployments plug in a client for their resource
//! API, while tests and the standalone binary use the in-memory
//! implementation from [`memory`].

use async_trait::async_trait;

use crate::model::{Certificate, IssuanceRecord};

/// Error types surfaced by record store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The named record does not exist.
    #[error("record {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    /// The backend could not serve the request.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait that must be implemented by all record store backends.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Fetch a certificate by namespace and name.
    ///
    /// A missing certificate is `Ok(None)`, not an error: the reconcile
    /// trigger may legitimately deliver keys for certificates deleted
    /// between enqueue and processing.
    async fn get_certificate(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<Certificate>>;

    /// Enumerate every certificate known to the store.
    async fn list_certificates(&self) -> StoreResult<Vec<Certificate>>;

    /// List every issuance record in a namespace.
    ///
    /// Implementations are not required to filter by ownership; callers
    /// apply the owner-reference predicate themselves.
    async fn list_records(&self, namespace: &str) -> StoreResult<Vec<IssuanceRecord>>;

    /// Delete a single issuance record by namespace and name.
    ///
    /// Deleting a record that no longer exists yields
    /// [`StoreError::NotFound`] so callers can distinguish an already-gone
    /// record from a transport failure.
    async fn delete_record(&self, namespace: &str, name: &str) -> StoreResult<()>;
}

pub mod memory;
pub use memory::InMemoryStore;
