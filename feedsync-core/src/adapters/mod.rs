//! Destination stores: where generated DDL runs and upsert batches land.
//!
//! # Module Structure
//! - `config`: connection settings shared by network-backed stores
//! - `memory`: in-process store used for dry runs and tests
//! - `postgres`: sqlx-backed PostgreSQL store (feature `postgresql`)

use crate::upsert::UpsertBatch;
use crate::{Result, error::FeedSyncError};
use async_trait::async_trait;
use std::collections::BTreeSet;

pub mod config;
mod memory;

#[cfg(feature = "postgresql")]
pub mod postgres;

pub use config::ConnectionConfig;
pub use memory::{MemoryStore, MemoryStoreError, StoredRow};

#[cfg(feature = "postgresql")]
pub use postgres::PostgresStore;

/// Relational store that receives DDL and upsert batches.
///
/// Row values only ever reach the store as bound parameters inside an
/// [`UpsertBatch`]; the only SQL text it is handed is DDL built from
/// validated identifiers.
///
/// # Object Safety
/// This trait is object-safe, allowing for dynamic dispatch through
/// `Box<dyn DestinationStore>`.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Executes a single DDL statement.
    ///
    /// # Errors
    /// Returns a `Destination` error carrying the store's own failure.
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Column names of `table` as the store currently sees them.
    ///
    /// A table that does not exist yields an empty set.
    ///
    /// # Errors
    /// Returns a `Destination` error if the catalog cannot be read.
    async fn fetch_columns(&self, table: &str) -> Result<BTreeSet<String>>;

    /// Runs every row of `batch` through its statement as one atomic unit.
    ///
    /// # Returns
    /// Number of rows written.
    ///
    /// # Errors
    /// Returns a `Destination` error; nothing from the batch is kept.
    async fn execute_batch(&self, batch: &UpsertBatch) -> Result<u64>;
}

#[async_trait]
impl<T: DestinationStore + ?Sized> DestinationStore for Box<T> {
    async fn execute(&self, sql: &str) -> Result<()> {
        (**self).execute(sql).await
    }

    async fn fetch_columns(&self, table: &str) -> Result<BTreeSet<String>> {
        (**self).fetch_columns(table).await
    }

    async fn execute_batch(&self, batch: &UpsertBatch) -> Result<u64> {
        (**self).execute_batch(batch).await
    }
}

/// Creates a destination store from a connection string.
///
/// `postgres://` and `postgresql://` URLs open a lazily connected pool;
/// `memory://` gives an empty in-process store.
///
/// # Errors
/// Returns a `Configuration` error if the scheme is unsupported, the URL is
/// malformed, or the required driver feature is not compiled in. The URL is
/// redacted in every message.
pub fn create_store(connection_string: &str) -> Result<Box<dyn DestinationStore>> {
    let scheme = url::Url::parse(connection_string)
        .map(|url| url.scheme().to_ascii_lowercase())
        .map_err(|_| {
            FeedSyncError::configuration(format!(
                "Invalid destination URL: {}",
                crate::error::redact_database_url(connection_string)
            ))
        })?;

    match scheme.as_str() {
        "memory" => Ok(Box::new(MemoryStore::new())),
        #[cfg(feature = "postgresql")]
        "postgres" | "postgresql" => Ok(Box::new(PostgresStore::new(connection_string)?)),
        #[cfg(not(feature = "postgresql"))]
        "postgres" | "postgresql" => Err(FeedSyncError::configuration(
            "PostgreSQL store unavailable: compile with --features postgresql",
        )),
        other => Err(FeedSyncError::configuration(format!(
            "Unsupported destination scheme '{}'",
            other
        ))),
    }
}
