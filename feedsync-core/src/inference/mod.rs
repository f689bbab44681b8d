//! Schema inference from flattened catalog rows.
//!
//! # Module Structure
//! - `type_guess`: per-column type guessing from observed values
//!
//! [`SchemaInferrer`] owns the per-table cache of rows and schemas. A table
//! is read from the row source at most once until it is invalidated, so
//! repeated calls return the same `Arc<Schema>`.

mod type_guess;

pub use type_guess::guess_type;

use crate::models::{Row, Schema};
use crate::source::RowSource;
use crate::{Result, error::FeedSyncError};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds the schema for one table from its rows.
///
/// Columns appear in first-seen order across all rows; the identity column is
/// appended if no row carried it. Each column's type comes from
/// [`guess_type`] over its trimmed, non-empty values.
pub fn infer_schema(table: &str, rows: &[Row], identity_column: Option<&str>) -> Schema {
    let mut names: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !names.contains(&key) {
                names.push(key);
            }
        }
    }
    if let Some(identity) = identity_column
        && !names.contains(&identity)
    {
        names.push(identity);
    }

    let mut schema = Schema::new(table);
    for name in names {
        let values = rows
            .iter()
            .filter_map(|row| row.get(name))
            .map(str::trim)
            .filter(|v| !v.is_empty());
        schema.push(name, guess_type(values));
    }
    schema
}

#[derive(Debug, Default)]
struct CachedTable {
    rows: Option<Arc<Vec<Row>>>,
    schema: Option<Arc<Schema>>,
}

/// Cache of rows and inferred schemas, one slot per table.
///
/// Lifetime is one per row-source connection; call [`SchemaInferrer::invalidate`]
/// or [`SchemaInferrer::reset`] when the source document should be re-read.
#[derive(Debug, Default)]
pub struct SchemaInferrer {
    tables: HashMap<String, CachedTable>,
}

impl SchemaInferrer {
    /// Creates an empty inferrer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rows of `table`, reading them from `source` on first access.
    ///
    /// # Errors
    /// Returns `FeedSyncError::NoData` when the source yields zero rows. An
    /// empty catalog section is treated like a failed fetch.
    pub fn rows<S>(&mut self, source: &S, table: &str) -> Result<Arc<Vec<Row>>>
    where
        S: RowSource + ?Sized,
    {
        if let Some(rows) = self.tables.get(table).and_then(|slot| slot.rows.as_ref()) {
            tracing::debug!("Using cached rows for table '{}'", table);
            return Ok(Arc::clone(rows));
        }

        let rows = source.read_rows(table)?;
        if rows.is_empty() {
            return Err(FeedSyncError::no_data(table));
        }
        tracing::debug!("Read {} rows for table '{}'", rows.len(), table);

        let rows = Arc::new(rows);
        self.tables.entry(table.to_string()).or_default().rows = Some(Arc::clone(&rows));
        Ok(rows)
    }

    /// Returns the inferred schema of `table`, inferring it on first access.
    pub fn schema<S>(
        &mut self,
        source: &S,
        table: &str,
        identity_column: Option<&str>,
    ) -> Result<Arc<Schema>>
    where
        S: RowSource + ?Sized,
    {
        if let Some(schema) = self.tables.get(table).and_then(|slot| slot.schema.as_ref()) {
            tracing::debug!("Using cached schema for table '{}'", table);
            return Ok(Arc::clone(schema));
        }

        let rows = self.rows(source, table)?;
        let schema = Arc::new(infer_schema(table, &rows, identity_column));
        tracing::info!(
            "Inferred {} columns for table '{}' from {} rows",
            schema.len(),
            table,
            rows.len()
        );

        let slot = self.tables.entry(table.to_string()).or_default();
        slot.schema = Some(Arc::clone(&schema));
        Ok(schema)
    }

    /// Whether a schema for `table` is currently cached.
    pub fn is_cached(&self, table: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|slot| slot.schema.is_some())
    }

    /// Drops the cached rows and schema of one table. Returns true if anything was cached.
    pub fn invalidate(&mut self, table: &str) -> bool {
        self.tables.remove(table).is_some()
    }

    /// Drops every cached table.
    pub fn reset(&mut self) {
        self.tables.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SqlType;
    use crate::source::MemorySource;

    fn offers() -> Vec<Row> {
        vec![
            Row::new().with("vendorCode", "101").with("price", "9.99"),
            Row::new()
                .with("vendorCode", "102")
                .with("name", "Lamp")
                .with_null("picture"),
            Row::new().with("price", "  ").with("name", "  Chair "),
        ]
    }

    #[test]
    fn test_infer_schema_first_seen_order() {
        let schema = infer_schema("offers", &offers(), Some("vendorCode"));
        assert_eq!(
            schema.column_names(),
            vec!["vendorCode", "price", "name", "picture"]
        );
        assert_eq!(schema.get("vendorCode"), Some(SqlType::BigInt));
        assert_eq!(schema.get("price"), Some(SqlType::BigInt));
        assert_eq!(schema.get("name"), Some(SqlType::Text));
        // Only nulls observed
        assert_eq!(schema.get("picture"), Some(SqlType::Text));
    }

    #[test]
    fn test_infer_schema_appends_unseen_identity() {
        let rows = vec![Row::new().with("code", "USD").with("rate", "1")];
        let schema = infer_schema("currency", &rows, Some("id"));

        assert_eq!(schema.column_names(), vec!["code", "rate", "id"]);
        assert_eq!(schema.get("id"), Some(SqlType::Text));
    }

    #[test]
    fn test_infer_schema_without_identity() {
        let rows = vec![Row::new().with("code", "USD")];
        let schema = infer_schema("currency", &rows, None);
        assert_eq!(schema.column_names(), vec!["code"]);
    }

    #[test]
    fn test_schema_is_cached_and_identical() {
        let source = MemorySource::new().with_table("offers", offers());
        let mut inferrer = SchemaInferrer::new();

        let first = inferrer.schema(&source, "offers", Some("vendorCode")).unwrap();
        let second = inferrer.schema(&source, "offers", Some("vendorCode")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.read_count("offers"), 1);
        assert!(inferrer.is_cached("offers"));
    }

    #[test]
    fn test_invalidate_forces_reread() {
        let source = MemorySource::new().with_table("offers", offers());
        let mut inferrer = SchemaInferrer::new();

        inferrer.schema(&source, "offers", Some("vendorCode")).unwrap();
        assert!(inferrer.invalidate("offers"));
        assert!(!inferrer.is_cached("offers"));
        inferrer.schema(&source, "offers", Some("vendorCode")).unwrap();

        assert_eq!(source.read_count("offers"), 2);
    }

    #[test]
    fn test_rows_are_shared_with_schema() {
        let source = MemorySource::new().with_table("offers", offers());
        let mut inferrer = SchemaInferrer::new();

        inferrer.schema(&source, "offers", None).unwrap();
        let rows = inferrer.rows(&source, "offers").unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(source.read_count("offers"), 1);
    }

    #[test]
    fn test_empty_table_is_no_data() {
        let source = MemorySource::new().with_table("offers", Vec::new());
        let mut inferrer = SchemaInferrer::new();

        let result = inferrer.schema(&source, "offers", Some("vendorCode"));
        assert!(matches!(result, Err(FeedSyncError::NoData { .. })));
        assert!(!inferrer.is_cached("offers"));
    }
}
