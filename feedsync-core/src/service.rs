//! Table-level sync operations over a row source and a destination store.
//!
//! [`CatalogSync`] ties the components together. For each call it:
//! 1. resolves the table against the configured set
//! 2. infers (or reuses) the table's schema
//! 3. renders DDL, checks drift, or upserts rows as requested
//!
//! The schema cache lives on the instance. Call [`CatalogSync::invalidate`]
//! or [`CatalogSync::reset`] when the source document has changed.

use crate::adapters::DestinationStore;
use crate::config::TableRegistry;
use crate::ddl::{AlterPlan, alter_table_plan, create_table_sql};
use crate::drift::ensure_no_drift;
use crate::identifier::validate_identifier;
use crate::inference::SchemaInferrer;
use crate::models::Schema;
use crate::source::RowSource;
use crate::upsert::{UpsertStatement, execute_upsert};
use crate::{Result, error::FeedSyncError};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of [`CatalogSync::update`] for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub table: String,
    pub rows_written: u64,
    pub rows_skipped: usize,
}

/// Synchronizes configured tables from `S` into `D`.
#[derive(Debug)]
pub struct CatalogSync<S, D> {
    source: S,
    store: D,
    tables: TableRegistry,
    inferrer: SchemaInferrer,
}

impl<S, D> CatalogSync<S, D>
where
    S: RowSource,
    D: DestinationStore,
{
    pub fn new(source: S, store: D, tables: TableRegistry) -> Self {
        Self {
            source,
            store,
            tables,
            inferrer: SchemaInferrer::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn tables(&self) -> &TableRegistry {
        &self.tables
    }

    /// Configured table names, in configuration order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.names()
    }

    fn resolve(&mut self, table: &str) -> Result<(Arc<Schema>, Option<String>)> {
        let identity = self.tables.require(table)?.identity_column.clone();
        let schema = self
            .inferrer
            .schema(&self.source, table, identity.as_deref())?;
        Ok((schema, identity))
    }

    /// `CREATE TABLE IF NOT EXISTS` text for `table`.
    ///
    /// # Errors
    /// `UnknownTable`, `NoData`, or `InvalidIdentifier`.
    pub fn table_ddl(&mut self, table: &str) -> Result<String> {
        let (schema, identity) = self.resolve(table)?;
        create_table_sql(table, &schema, identity.as_deref())
    }

    /// Column names of the inferred schema, in schema order.
    ///
    /// # Errors
    /// `UnknownTable` or `NoData`.
    pub fn column_names(&mut self, table: &str) -> Result<Vec<String>> {
        Ok(self.resolve(table)?.0.column_names())
    }

    /// Whether `column` is non-null in every row and never repeats.
    ///
    /// # Errors
    /// `InvalidIdentifier` for a malformed column name, then `UnknownTable`
    /// or `NoData`.
    pub fn is_column_id(&mut self, table: &str, column: &str) -> Result<bool> {
        validate_identifier(column)?;
        self.tables.require(table)?;

        let rows = self.inferrer.rows(&self.source, table)?;
        let mut seen = HashSet::with_capacity(rows.len());
        Ok(rows
            .iter()
            .all(|row| row.get(column).is_some_and(|value| seen.insert(value))))
    }

    /// Creates the table if needed, verifies its structure, and upserts every row.
    ///
    /// # Errors
    /// - `InvalidUpsert` if the table has no identity column configured, or
    ///   nothing besides it to update; raised before the table is created
    /// - `StructureDrift` if the live table differs from the inferred schema
    /// - `Coercion` if a value does not fit its column type
    /// - `Destination` for store failures
    pub async fn update(&mut self, table: &str) -> Result<UpsertSummary> {
        let (schema, identity) = self.resolve(table)?;
        let identity = identity.ok_or_else(|| {
            FeedSyncError::invalid_upsert(table, "no identity column is configured")
        })?;
        let statement = UpsertStatement::compile(table, &identity, &schema)?;
        tracing::info!("Updating table '{}'", table);

        let ddl = create_table_sql(table, &schema, Some(&identity))?;
        tracing::debug!("Table DDL:\n{}", ddl);
        self.store.execute(&ddl).await?;

        let live_columns = self.store.fetch_columns(table).await?;
        ensure_no_drift(table, &schema, &live_columns)?;

        let rows = self.inferrer.rows(&self.source, table)?;
        let counts = execute_upsert(&self.store, &statement, &rows).await?;

        Ok(UpsertSummary {
            table: table.to_string(),
            rows_written: counts.written,
            rows_skipped: counts.skipped,
        })
    }

    /// Runs [`CatalogSync::update`] for every configured table, in order.
    ///
    /// # Errors
    /// Stops at the first failing table; tables before it stay committed.
    pub async fn update_all(&mut self) -> Result<Vec<UpsertSummary>> {
        let mut summaries = Vec::new();
        for table in self.table_names() {
            summaries.push(self.update(&table).await?);
        }
        Ok(summaries)
    }

    /// Columns the live table lacks compared to the inferred schema.
    ///
    /// Extra live columns and type differences are not reported here.
    ///
    /// # Errors
    /// `UnknownTable`, `NoData`, `InvalidIdentifier`, or `Destination`.
    pub async fn ddl_change(&mut self, table: &str) -> Result<AlterPlan> {
        let (schema, _) = self.resolve(table)?;
        let live_columns = self.store.fetch_columns(table).await?;
        alter_table_plan(table, &schema, &live_columns)
    }

    /// Executes the statements of [`CatalogSync::ddl_change`] and returns the plan.
    ///
    /// # Errors
    /// As [`CatalogSync::ddl_change`]; a failing statement stops the rest.
    pub async fn apply_ddl_change(&mut self, table: &str) -> Result<AlterPlan> {
        let plan = self.ddl_change(table).await?;
        for statement in plan.statements() {
            tracing::info!("Applying: {}", statement);
            self.store.execute(statement).await?;
        }
        Ok(plan)
    }

    /// Drops the cached rows and schema of `table`.
    pub fn invalidate(&mut self, table: &str) -> bool {
        self.inferrer.invalidate(table)
    }

    /// Drops every cached table.
    pub fn reset(&mut self) {
        self.inferrer.reset();
    }

    /// Consumes the service, returning the source and store.
    pub fn into_parts(self) -> (S, D) {
        (self.source, self.store)
    }
}
