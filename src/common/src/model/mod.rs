//! Domain model for certificates and their issuance records.
//!
//! A certificate is a long-lived resource that is re-issued periodically;
//! every issuance attempt leaves behind an immutable issuance record owned
//! by the certificate. The pruner keeps the newest records and deletes the
//! surplus, so the model here is deliberately small: identity, ownership,
//! readiness, and the string-typed revision marker that orders records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owner-reference kind carried by records that belong to a certificate.
pub const CERTIFICATE_KIND: &str = "Certificate";

/// Namespace-qualified resource identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse a `namespace/name` reconcile key.
    ///
    /// Keys arrive from an event trigger and may be stale or malformed;
    /// anything that is not exactly two non-empty segments joined by a
    /// single `/` yields `None` rather than an error.
    pub fn parse_key(key: &str) -> Option<Self> {
        let mut parts = key.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(namespace), Some(name), None) if !namespace.is_empty() && !name.is_empty() => {
                Some(Self::new(namespace, name))
            }
            _ => None,
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Status of a certificate condition.
///
/// Mirrors the three-valued condition convention of the issuance API:
/// a condition that has never been reported is `Unknown`, not `False`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

/// A certificate resource, read-only to the pruner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub namespace: String,
    pub name: String,
    /// Unique identity of this incarnation of the certificate. A deleted
    /// and re-created certificate gets a fresh UID, so stale owner
    /// references never match the new incarnation.
    pub uid: Uuid,
    /// The `Ready` condition as last reported by the issuance workflow.
    pub ready: ConditionStatus,
    /// Maximum number of issuance records to retain. `None` means
    /// unbounded retention; zero is legal and prunes every record.
    pub revision_history_limit: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Certificate {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: Uuid::new_v4(),
            ready: ConditionStatus::Unknown,
            revision_history_limit: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_ready(mut self, ready: ConditionStatus) -> Self {
        self.ready = ready;
        self
    }

    pub fn with_revision_history_limit(mut self, limit: u32) -> Self {
        self.revision_history_limit = Some(limit);
        self
    }

    /// Whether the last issuance completed successfully.
    pub fn is_ready(&self) -> bool {
        self.ready == ConditionStatus::True
    }

    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(self.namespace.clone(), self.name.clone())
    }

    /// The `namespace/name` reconcile key for this certificate.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Owner reference to stamp onto issuance records this certificate owns.
    pub fn owner_ref(&self) -> OwnerRef {
        OwnerRef {
            kind: CERTIFICATE_KIND.to_string(),
            name: self.name.clone(),
            uid: self.uid,
        }
    }
}

/// Reference from an issuance record back to its owning certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
    pub uid: Uuid,
}

/// An immutable record of one issuance attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuanceRecord {
    pub namespace: String,
    pub name: String,
    /// Owning certificate, if any. Records without an owner reference are
    /// never considered for pruning.
    pub owner: Option<OwnerRef>,
    /// String-typed revision marker. Expected to parse as a base-10
    /// non-negative integer; transitional records may carry no revision
    /// or an unparseable one.
    pub revision: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl IssuanceRecord {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            owner: None,
            revision: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn owned_by(mut self, certificate: &Certificate) -> Self {
        self.owner = Some(certificate.owner_ref());
        self
    }

    /// Whether this record's owner reference points at `certificate`.
    ///
    /// Requires kind, name, and UID to all match; a record owned by a
    /// previous incarnation of a certificate with the same name fails the
    /// UID comparison.
    pub fn is_owned_by(&self, certificate: &Certificate) -> bool {
        match &self.owner {
            Some(owner) => {
                owner.kind == CERTIFICATE_KIND
                    && owner.name == certificate.name
                    && owner.uid == certificate.uid
            }
            None => false,
        }
    }

    /// Parse the revision field as a base-10 non-negative integer.
    ///
    /// Total: missing, empty, and non-numeric values all map to `None`.
    pub fn parsed_revision(&self) -> Option<u64> {
        self.revision.as_deref()?.parse::<u64>().ok()
    }
}

impl fmt::Display for IssuanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
