//! In-process destination store.
//!
//! Understands exactly the DDL this crate generates (`CREATE TABLE IF NOT
//! EXISTS` and `ALTER TABLE ... ADD COLUMN`) and applies upsert batches keyed
//! on the conflict column. Every executed statement is recorded, which is
//! what `--dry-run` prints.

use super::DestinationStore;
use crate::models::{BoundValue, SqlType};
use crate::upsert::UpsertBatch;
use crate::{Result, error::FeedSyncError};
use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use thiserror::Error;
use tokio::sync::Mutex;

/// One stored row: column name to value.
pub type StoredRow = BTreeMap<String, BoundValue>;

/// Failures raised by [`MemoryStore`], wrapped as `Destination` errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryStoreError {
    #[error("relation \"{0}\" does not exist")]
    UnknownTable(String),

    #[error("column \"{column}\" of relation \"{table}\" does not exist")]
    UnknownColumn { table: String, column: String },

    #[error("column \"{column}\" of relation \"{table}\" already exists")]
    DuplicateColumn { table: String, column: String },

    #[error("no primary key on \"{table}\" matches ON CONFLICT (\"{column}\")")]
    NoConflictTarget { table: String, column: String },

    #[error("unsupported statement: {0}")]
    UnsupportedStatement(String),
}

#[derive(Debug, Clone, Default)]
struct StoredTable {
    columns: Vec<(String, SqlType)>,
    primary_key: Option<String>,
    rows: Vec<StoredRow>,
}

impl StoredTable {
    fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|(name, _)| name == column)
    }
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, StoredTable>,
    executed: Vec<String>,
}

/// Destination store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

struct DdlPatterns {
    create_table: Regex,
    column: Regex,
    primary_key: Regex,
    add_column: Regex,
}

impl DdlPatterns {
    fn get() -> &'static Self {
        static PATTERNS: OnceLock<DdlPatterns> = OnceLock::new();
        #[allow(clippy::expect_used)]
        PATTERNS.get_or_init(|| Self {
            create_table: Regex::new(
                r#"(?s)^\s*CREATE TABLE IF NOT EXISTS "([A-Za-z_][A-Za-z0-9_]*)" \((.*)\);\s*$"#,
            )
            .expect("create table pattern is valid"),
            column: Regex::new(r#"^"([A-Za-z_][A-Za-z0-9_]*)" ([a-z]+)$"#)
                .expect("column pattern is valid"),
            primary_key: Regex::new(
                r#"^CONSTRAINT "[A-Za-z_][A-Za-z0-9_]*" PRIMARY KEY \("([A-Za-z_][A-Za-z0-9_]*)"\)$"#,
            )
            .expect("primary key pattern is valid"),
            add_column: Regex::new(
                r#"^\s*ALTER TABLE "([A-Za-z_][A-Za-z0-9_]*)" ADD COLUMN "([A-Za-z_][A-Za-z0-9_]*)" ([a-z]+);?\s*$"#,
            )
            .expect("add column pattern is valid"),
        })
    }
}

fn unsupported(sql: &str) -> FeedSyncError {
    FeedSyncError::destination_failed(
        "Failed to execute DDL",
        MemoryStoreError::UnsupportedStatement(sql.trim().to_string()),
    )
}

fn parse_create_table(sql: &str) -> Result<Option<(String, StoredTable)>> {
    let patterns = DdlPatterns::get();
    let Some(captures) = patterns.create_table.captures(sql) else {
        return Ok(None);
    };

    let mut table = StoredTable::default();
    for line in captures[2].split(",\n").map(str::trim) {
        if let Some(column) = patterns.column.captures(line) {
            let sql_type = SqlType::from_ddl(&column[2]).ok_or_else(|| unsupported(sql))?;
            table.columns.push((column[1].to_string(), sql_type));
        } else if let Some(pk) = patterns.primary_key.captures(line) {
            table.primary_key = Some(pk[1].to_string());
        } else {
            return Err(unsupported(sql));
        }
    }

    Ok(Some((captures[1].to_string(), table)))
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every statement accepted by [`DestinationStore::execute`], in order.
    pub async fn executed_statements(&self) -> Vec<String> {
        self.state.lock().await.executed.clone()
    }

    /// Names of existing tables, sorted.
    pub async fn table_names(&self) -> Vec<String> {
        self.state.lock().await.tables.keys().cloned().collect()
    }

    /// Column names and types of `table`, in creation order.
    pub async fn columns(&self, table: &str) -> Option<Vec<(String, SqlType)>> {
        self.state
            .lock()
            .await
            .tables
            .get(table)
            .map(|t| t.columns.clone())
    }

    /// Snapshot of the rows of `table`, in first-insert order.
    pub async fn rows(&self, table: &str) -> Vec<StoredRow> {
        self.state
            .lock()
            .await
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Adds a column out of band, as another client altering the table would.
    ///
    /// # Errors
    /// Returns a `Destination` error if the table is missing or the column exists.
    pub async fn add_column(&self, table: &str, column: &str, sql_type: SqlType) -> Result<()> {
        let mut state = self.state.lock().await;
        add_column(&mut state, table, column, sql_type)
    }

    /// Drops a column out of band. Stored values for it are discarded.
    ///
    /// # Errors
    /// Returns a `Destination` error if the table or column is missing.
    pub async fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let stored = state.tables.get_mut(table).ok_or_else(|| {
            FeedSyncError::destination_failed(
                "Failed to drop column",
                MemoryStoreError::UnknownTable(table.to_string()),
            )
        })?;
        if !stored.has_column(column) {
            return Err(FeedSyncError::destination_failed(
                "Failed to drop column",
                MemoryStoreError::UnknownColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                },
            ));
        }

        stored.columns.retain(|(name, _)| name != column);
        if stored.primary_key.as_deref() == Some(column) {
            stored.primary_key = None;
        }
        for row in &mut stored.rows {
            row.remove(column);
        }
        Ok(())
    }
}

fn add_column(state: &mut State, table: &str, column: &str, sql_type: SqlType) -> Result<()> {
    let stored = state.tables.get_mut(table).ok_or_else(|| {
        FeedSyncError::destination_failed(
            "Failed to add column",
            MemoryStoreError::UnknownTable(table.to_string()),
        )
    })?;
    if stored.has_column(column) {
        return Err(FeedSyncError::destination_failed(
            "Failed to add column",
            MemoryStoreError::DuplicateColumn {
                table: table.to_string(),
                column: column.to_string(),
            },
        ));
    }

    stored.columns.push((column.to_string(), sql_type));
    for row in &mut stored.rows {
        row.insert(column.to_string(), BoundValue::Null(sql_type));
    }
    Ok(())
}

fn apply_batch(stored: &mut StoredTable, batch: &UpsertBatch) -> std::result::Result<u64, MemoryStoreError> {
    let statement = batch.statement();
    let table = statement.table();

    if stored.primary_key.as_deref() != Some(statement.identity_column()) {
        return Err(MemoryStoreError::NoConflictTarget {
            table: table.to_string(),
            column: statement.identity_column().to_string(),
        });
    }
    if let Some(missing) = statement.columns().iter().find(|c| !stored.has_column(c)) {
        return Err(MemoryStoreError::UnknownColumn {
            table: table.to_string(),
            column: missing.clone(),
        });
    }

    let mut written: u64 = 0;
    for values in batch.rows() {
        let identity = &values[statement.identity_index()];
        let position = stored
            .rows
            .iter()
            .position(|row| row.get(statement.identity_column()) == Some(identity));

        match position {
            Some(index) => {
                let row = &mut stored.rows[index];
                for (column, value) in statement.columns().iter().zip(values) {
                    row.insert(column.clone(), value.clone());
                }
            }
            None => {
                let mut row: StoredRow = stored
                    .columns
                    .iter()
                    .map(|(name, sql_type)| (name.clone(), BoundValue::Null(*sql_type)))
                    .collect();
                for (column, value) in statement.columns().iter().zip(values) {
                    row.insert(column.clone(), value.clone());
                }
                stored.rows.push(row);
            }
        }
        written = written.saturating_add(1);
    }

    Ok(written)
}

#[async_trait]
impl DestinationStore for MemoryStore {
    async fn execute(&self, sql: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        if let Some((name, table)) = parse_create_table(sql)? {
            state.tables.entry(name).or_insert(table);
        } else if let Some(captures) = DdlPatterns::get().add_column.captures(sql) {
            let sql_type = SqlType::from_ddl(&captures[3]).ok_or_else(|| unsupported(sql))?;
            add_column(&mut state, &captures[1], &captures[2], sql_type)?;
        } else {
            return Err(unsupported(sql));
        }

        state.executed.push(sql.to_string());
        Ok(())
    }

    async fn fetch_columns(&self, table: &str) -> Result<BTreeSet<String>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .get(table)
            .map(|t| t.columns.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default())
    }

    async fn execute_batch(&self, batch: &UpsertBatch) -> Result<u64> {
        let table = batch.statement().table();
        let mut state = self.state.lock().await;
        let stored = state.tables.get_mut(table).ok_or_else(|| {
            FeedSyncError::destination_failed(
                format!("Upsert into '{}' failed", table),
                MemoryStoreError::UnknownTable(table.to_string()),
            )
        })?;

        // Work on a copy so a failing batch leaves the table untouched.
        let mut staged = stored.clone();
        let written = apply_batch(&mut staged, batch).map_err(|e| {
            FeedSyncError::destination_failed(format!("Upsert into '{}' failed", table), e)
        })?;
        *stored = staged;
        Ok(written)
    }
}
