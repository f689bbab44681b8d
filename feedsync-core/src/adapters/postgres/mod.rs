//! PostgreSQL destination store.
//!
//! # Module Structure
//! - `connection`: connection string parsing and pool setup
//!
//! The pool connects lazily, so constructing a store never touches the
//! network. Column discovery is scoped to `current_schema()`.

mod connection;

use super::{ConnectionConfig, DestinationStore};
use crate::models::{BoundValue, SqlType};
use crate::upsert::UpsertBatch;
use crate::{Result, error::FeedSyncError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use sqlx::{Executor, PgPool};
use std::collections::BTreeSet;

const FETCH_COLUMNS_SQL: &str = "SELECT column_name::text \
     FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = $1 \
     ORDER BY ordinal_position";

/// PostgreSQL store backed by a sqlx connection pool.
pub struct PostgresStore {
    pool: PgPool,
    config: ConnectionConfig,
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("config", &self.config)
            .field("pool_size", &self.pool.size())
            .field("pool_idle", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresStore {
    /// Creates a store with settings parsed from `connection_string`.
    ///
    /// # Errors
    /// Returns a `Configuration` error if the connection string is invalid.
    pub fn new(connection_string: &str) -> Result<Self> {
        let config = Self::parse_connection_config(connection_string)?;
        let pool = Self::create_connection_pool(connection_string, &config)?;
        Ok(Self { pool, config })
    }

    /// Creates a store with explicit settings.
    ///
    /// # Errors
    /// Returns a `Configuration` error if either input is invalid.
    pub fn with_config(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        Self::validate_connection_string(connection_string)?;
        let pool = Self::create_connection_pool(connection_string, &config)?;
        Ok(Self { pool, config })
    }

    /// Connection settings, without credentials.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// True if a connection can be acquired and answers `SELECT 1`.
    pub async fn is_healthy(&self) -> bool {
        matches!(
            sqlx::query_scalar::<_, i32>("SELECT 1")
                .fetch_one(&self.pool)
                .await,
            Ok(1)
        )
    }

    /// Closes the pool, waiting for checked-out connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q BoundValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        BoundValue::BigInt(v) => query.bind(*v),
        BoundValue::Integer(v) => query.bind(*v),
        BoundValue::Decimal(v) => query.bind(*v),
        BoundValue::Boolean(v) => query.bind(*v),
        BoundValue::Text(v) => query.bind(v.as_str()),
        BoundValue::Null(sql_type) => match sql_type {
            SqlType::BigInt => query.bind(None::<i64>),
            SqlType::Integer => query.bind(None::<i32>),
            SqlType::Decimal => query.bind(None::<Decimal>),
            SqlType::Boolean => query.bind(None::<bool>),
            SqlType::Text | SqlType::Varchar => query.bind(None::<String>),
        },
    }
}

#[async_trait]
impl DestinationStore for PostgresStore {
    async fn execute(&self, sql: &str) -> Result<()> {
        tracing::debug!("Executing DDL:\n{}", sql);
        self.pool
            .execute(sql)
            .await
            .map_err(|e| FeedSyncError::destination_failed("Failed to execute DDL", e))?;
        Ok(())
    }

    async fn fetch_columns(&self, table: &str) -> Result<BTreeSet<String>> {
        let columns: Vec<String> = sqlx::query_scalar(FETCH_COLUMNS_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                FeedSyncError::destination_failed(
                    format!("Failed to fetch columns of '{}'", table),
                    e,
                )
            })?;
        Ok(columns.into_iter().collect())
    }

    async fn execute_batch(&self, batch: &UpsertBatch) -> Result<u64> {
        let table = batch.statement().table();
        let mut tx = self.pool.begin().await.map_err(|e| {
            FeedSyncError::destination_failed(
                format!("Failed to begin transaction for '{}'", table),
                e,
            )
        })?;

        let mut written: u64 = 0;
        for row in batch.rows() {
            let query = row
                .iter()
                .fold(sqlx::query(batch.statement().sql()), bind_value);
            let result = query.execute(&mut *tx).await.map_err(|e| {
                FeedSyncError::destination_failed(format!("Upsert into '{}' failed", table), e)
            })?;
            written = written.saturating_add(result.rows_affected());
        }

        // Dropping the transaction on an earlier error rolls it back.
        tx.commit().await.map_err(|e| {
            FeedSyncError::destination_failed(
                format!("Failed to commit upsert into '{}'", table),
                e,
            )
        })?;

        Ok(written)
    }
}
