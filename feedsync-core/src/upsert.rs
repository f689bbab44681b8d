//! Batched `INSERT ... ON CONFLICT DO UPDATE` from an inferred schema.
//!
//! An [`UpsertStatement`] is compiled once per call and every row is bound
//! against it into an [`UpsertBatch`]. Binding finishes before the store is
//! touched, so a coercion failure on any row leaves the destination as it was.
//! Rows keep their input order in the batch; a later duplicate identity
//! overwrites an earlier one.

use crate::adapters::DestinationStore;
use crate::identifier::quote_identifier;
use crate::models::{BoundValue, Row, Schema, SqlType};
use crate::{Result, error::FeedSyncError};

/// A compiled, parameterized upsert for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertStatement {
    table: String,
    identity_column: String,
    identity_index: usize,
    columns: Vec<String>,
    types: Vec<SqlType>,
    sql: String,
}

impl UpsertStatement {
    /// Compiles the statement for every schema column, in schema order.
    ///
    /// # Errors
    /// - `InvalidUpsert` if the identity column is not in the schema or it is
    ///   the only column
    /// - `InvalidIdentifier` if any name fails the identifier gate
    pub fn compile(table: &str, identity_column: &str, schema: &Schema) -> Result<Self> {
        let identity_index = schema
            .columns
            .iter()
            .position(|c| c.name == identity_column)
            .ok_or_else(|| {
                FeedSyncError::invalid_upsert(
                    table,
                    format!("identity column '{}' is not in the schema", identity_column),
                )
            })?;

        if schema.len() < 2 {
            return Err(FeedSyncError::invalid_upsert(
                table,
                "no columns to update besides the identity column",
            ));
        }

        let quoted: Vec<String> = schema
            .columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect::<Result<_>>()?;
        let placeholders: Vec<String> = (1..=quoted.len()).map(|i| format!("${}", i)).collect();
        let assignments: Vec<String> = quoted
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != identity_index)
            .map(|(_, column)| format!("{} = EXCLUDED.{}", column, column))
            .collect();

        let sql = format!(
            "INSERT INTO {} ({})\nVALUES ({})\nON CONFLICT ({}) DO UPDATE SET {}",
            quote_identifier(table)?,
            quoted.join(", "),
            placeholders.join(", "),
            quoted[identity_index],
            assignments.join(", ")
        );

        Ok(Self {
            table: table.to_string(),
            identity_column: identity_column.to_string(),
            identity_index,
            columns: schema.column_names(),
            types: schema.columns.iter().map(|c| c.sql_type).collect(),
            sql,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn identity_column(&self) -> &str {
        &self.identity_column
    }

    /// Position of the identity column among the bound parameters.
    pub fn identity_index(&self) -> usize {
        self.identity_index
    }

    /// Column names in parameter order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Column types in parameter order.
    pub fn types(&self) -> &[SqlType] {
        &self.types
    }

    /// Statement text with `$n` placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Binds `rows` in order, skipping rows with an absent or blank identity.
    ///
    /// # Errors
    /// Returns `Coercion` for the first value that does not parse under its
    /// column type; no batch is produced in that case.
    pub fn bind_rows(&self, rows: &[Row]) -> Result<UpsertBatch> {
        let mut bound_rows = Vec::with_capacity(rows.len());
        let mut skipped = 0;

        for row in rows {
            let identity = row.get(&self.identity_column).map(str::trim);
            if identity.is_none_or(str::is_empty) {
                skipped += 1;
                continue;
            }
            bound_rows.push(self.bind_row(row)?);
        }

        Ok(UpsertBatch {
            statement: self.clone(),
            rows: bound_rows,
            skipped,
        })
    }

    fn bind_row(&self, row: &Row) -> Result<Vec<BoundValue>> {
        self.columns
            .iter()
            .zip(&self.types)
            .map(|(column, sql_type)| {
                let raw = row.get(column);
                sql_type.bind(raw).map_err(|e| FeedSyncError::Coercion {
                    table: self.table.clone(),
                    column: column.clone(),
                    value: raw.unwrap_or_default().to_string(),
                    sql_type: sql_type.to_string(),
                    source: Box::new(e),
                })
            })
            .collect()
    }
}

/// Bound rows ready to execute as one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertBatch {
    statement: UpsertStatement,
    rows: Vec<Vec<BoundValue>>,
    skipped: usize,
}

impl UpsertBatch {
    pub fn statement(&self) -> &UpsertStatement {
        &self.statement
    }

    /// Parameter lists, one per kept row, in input order.
    pub fn rows(&self) -> &[Vec<BoundValue>] {
        &self.rows
    }

    /// Rows dropped for a blank identity.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Counts reported by [`upsert`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub written: u64,
    pub skipped: usize,
}

/// Compiles, binds, and executes an upsert of `rows` into `table`.
///
/// An empty batch (every row skipped) does not reach the store.
///
/// # Errors
/// `InvalidUpsert` and `Coercion` are raised before any I/O. Store failures
/// propagate unchanged.
pub async fn upsert<D>(
    store: &D,
    table: &str,
    identity_column: &str,
    schema: &Schema,
    rows: &[Row],
) -> Result<UpsertCounts>
where
    D: DestinationStore + ?Sized,
{
    let statement = UpsertStatement::compile(table, identity_column, schema)?;
    execute_upsert(store, &statement, rows).await
}

/// Binds `rows` against an already compiled statement and executes the batch.
///
/// # Errors
/// `Coercion` is raised before any I/O. Store failures propagate unchanged.
pub async fn execute_upsert<D>(
    store: &D,
    statement: &UpsertStatement,
    rows: &[Row],
) -> Result<UpsertCounts>
where
    D: DestinationStore + ?Sized,
{
    let table = statement.table();
    tracing::debug!("Compiled upsert for '{}':\n{}", table, statement.sql());

    let batch = statement.bind_rows(rows)?;
    if batch.skipped() > 0 {
        tracing::warn!(
            "Skipped {} row(s) of '{}' with blank '{}'",
            batch.skipped(),
            table,
            statement.identity_column()
        );
    }

    if batch.is_empty() {
        tracing::info!("Nothing to write for table '{}'", table);
        return Ok(UpsertCounts {
            written: 0,
            skipped: batch.skipped(),
        });
    }

    let written = store.execute_batch(&batch).await?;
    tracing::info!("Upserted {} row(s) into '{}'", written, table);

    Ok(UpsertCounts {
        written,
        skipped: batch.skipped(),
    })
}
