//! Revision extraction and ordering for issuance records.
//!
//! Pruning decisions rank records by their revision marker, a string field
//! that should parse as a base-10 non-negative integer. Records that carry
//! no parseable revision are transitional and must be left alone, so they
//! are dropped from the ranking entirely rather than treated as errors.

use common::model::IssuanceRecord;

/// An issuance record paired with its parsed revision number.
///
/// Computed fresh on every reconciliation pass and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision<'a> {
    pub rev: u64,
    pub record: &'a IssuanceRecord,
}

/// Extract parseable revisions and order them oldest to newest.
///
/// Records whose revision field is missing, empty, or not a base-10
/// non-negative integer are dropped silently. The sort is stable, so
/// records sharing a revision number keep their relative input order;
/// callers rely on this as the tie-break rule.
///
/// Pure function of its input: empty or all-invalid input yields an empty
/// vector, never an error.
pub fn extract_and_sort(records: &[IssuanceRecord]) -> Vec<Revision<'_>> {
    let mut revisions: Vec<Revision<'_>> = records
        .iter()
        .filter_map(|record| match record.parsed_revision() {
            Some(rev) => Some(Revision { rev, record }),
            None => {
                tracing::debug!(
                    record = %record,
                    revision = record.revision.as_deref().unwrap_or(""),
                    "Skipping record without a parseable revision"
                );
                None
            }
        })
        .collect();

    // Vec::sort_by_key is stable; equal revisions keep their input order.
    revisions.sort_by_key(|revision| revision.rev);

    revisions
}
