//! Structural drift between an inferred schema and a live destination table.
//!
//! Upserts bind values column-for-column, so they must never run against a
//! table whose column set differs from the schema. Any difference is fatal
//! and left to an operator; nothing here repairs it.

use crate::models::Schema;
use crate::{Result, error::FeedSyncError};
use std::collections::BTreeSet;

/// Asymmetric column differences between destination and source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    pub only_in_destination: BTreeSet<String>,
    pub only_in_source: BTreeSet<String>,
}

impl DriftReport {
    /// True when both column sets are equal.
    pub fn is_clean(&self) -> bool {
        self.only_in_destination.is_empty() && self.only_in_source.is_empty()
    }
}

/// Compares the schema's column names with the destination's column set.
pub fn compare_columns(schema: &Schema, destination: &BTreeSet<String>) -> DriftReport {
    let source = schema.column_set();
    DriftReport {
        only_in_destination: destination.difference(&source).cloned().collect(),
        only_in_source: source.difference(destination).cloned().collect(),
    }
}

/// Fails with `StructureDrift` unless the column sets are equal.
///
/// # Errors
/// Returns `FeedSyncError::StructureDrift` naming the columns only in the
/// destination and the columns only in the source-derived schema.
pub fn ensure_no_drift(table: &str, schema: &Schema, destination: &BTreeSet<String>) -> Result<()> {
    let report = compare_columns(schema, destination);
    if report.is_clean() {
        return Ok(());
    }

    tracing::error!(
        "Schema drift on table '{}': only in DB {:?}, only in source {:?}",
        table,
        report.only_in_destination,
        report.only_in_source
    );
    Err(FeedSyncError::StructureDrift {
        table: table.to_string(),
        only_in_destination: report.only_in_destination,
        only_in_source: report.only_in_source,
    })
}
