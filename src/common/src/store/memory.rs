use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RecordStore, StoreError, StoreResult};
use crate::model::{Certificate, IssuanceRecord};

/// In-memory record store backed by `tokio::sync::RwLock`.
///
/// Certificates and records are kept in insertion order so listings are
/// deterministic; tie-breaking between records with equal revisions depends
/// on a stable listing order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<State>>,
}

#[derive(Debug, Default)]
struct State {
    certificates: Vec<Certificate>,
    records: Vec<IssuanceRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a certificate, replacing any previous one with the same
    /// namespace and name.
    pub async fn insert_certificate(&self, certificate: Certificate) {
        let mut state = self.inner.write().await;
        state
            .certificates
            .retain(|c| c.namespace != certificate.namespace || c.name != certificate.name);
        state.certificates.push(certificate);
    }

    /// Insert an issuance record, replacing any previous one with the same
    /// namespace and name.
    pub async fn insert_record(&self, record: IssuanceRecord) {
        let mut state = self.inner.write().await;
        state
            .records
            .retain(|r| r.namespace != record.namespace || r.name != record.name);
        state.records.push(record);
    }

    pub async fn remove_certificate(&self, namespace: &str, name: &str) {
        let mut state = self.inner.write().await;
        state
            .certificates
            .retain(|c| c.namespace != namespace || c.name != name);
    }

    /// Names of the records currently stored in a namespace, in listing
    /// order. Test helper for asserting which records survived a pass.
    pub async fn record_names(&self, namespace: &str) -> Vec<String> {
        let state = self.inner.read().await;
        state
            .records
            .iter()
            .filter(|r| r.namespace == namespace)
            .map(|r| r.name.clone())
            .collect()
    }

    pub async fn contains_record(&self, namespace: &str, name: &str) -> bool {
        let state = self.inner.read().await;
        state
            .records
            .iter()
            .any(|r| r.namespace == namespace && r.name == name)
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get_certificate(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<Certificate>> {
        let state = self.inner.read().await;
        Ok(state
            .certificates
            .iter()
            .find(|c| c.namespace == namespace && c.name == name)
            .cloned())
    }

    async fn list_certificates(&self) -> StoreResult<Vec<Certificate>> {
        let state = self.inner.read().await;
        Ok(state.certificates.clone())
    }

    async fn list_records(&self, namespace: &str) -> StoreResult<Vec<IssuanceRecord>> {
        let state = self.inner.read().await;
        Ok(state
            .records
            .iter()
            .filter(|r| r.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn delete_record(&self, namespace: &str, name: &str) -> StoreResult<()> {
        let mut state = self.inner.write().await;
        let before = state.records.len();
        state
            .records
            .retain(|r| r.namespace != namespace || r.name != name);

        if state.records.len() == before {
            return Err(StoreError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConditionStatus;

    #[tokio::test]
    async fn test_certificate_round_trip() {
        let store = InMemoryStore::new();
        let cert = Certificate::new("testns", "test-cert").with_ready(ConditionStatus::True);
        store.insert_certificate(cert.clone()).await;

        let fetched = store.get_certificate("testns", "test-cert").await.unwrap();
        assert_eq!(fetched, Some(cert));

        let missing = store.get_certificate("testns", "other").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_insert_certificate_replaces_existing() {
        let store = InMemoryStore::new();
        store
            .insert_certificate(Certificate::new("testns", "test-cert"))
            .await;
        let replacement = Certificate::new("testns", "test-cert").with_revision_history_limit(3);
        store.insert_certificate(replacement.clone()).await;

        assert_eq!(store.list_certificates().await.unwrap().len(), 1);
        let fetched = store
            .get_certificate("testns", "test-cert")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.revision_history_limit, Some(3));
        assert_eq!(fetched.uid, replacement.uid);
    }

    #[tokio::test]
    async fn test_list_records_is_namespace_scoped_and_ordered() {
        let store = InMemoryStore::new();
        store
            .insert_record(IssuanceRecord::new("testns", "cr-2"))
            .await;
        store
            .insert_record(IssuanceRecord::new("testns", "cr-1"))
            .await;
        store
            .insert_record(IssuanceRecord::new("otherns", "cr-3"))
            .await;

        let records = store.list_records("testns").await.unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        // Insertion order, not name order.
        assert_eq!(names, vec!["cr-2", "cr-1"]);
    }

    #[tokio::test]
    async fn test_delete_record() {
        let store = InMemoryStore::new();
        store
            .insert_record(IssuanceRecord::new("testns", "cr-1"))
            .await;

        store.delete_record("testns", "cr-1").await.unwrap();
        assert!(!store.contains_record("testns", "cr-1").await);
    }

    #[tokio::test]
    async fn test_delete_missing_record_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.delete_record("testns", "cr-1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
