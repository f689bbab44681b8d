//! Core library for feedsync: catalog feeds into relational tables.
//!
//! A catalog document is read as flattened rows per logical table. From
//! those rows a column schema is inferred, rendered as DDL, checked against
//! the live destination table, and used to upsert every row in one
//! transaction.
//!
//! # Guarantees
//! - Row values only ever reach the destination as bound parameters
//! - Identifiers reach SQL text only after passing the identifier gate
//! - Structural drift between schema and destination is fatal, never repaired
//! - Connection strings are redacted in every error and log line
//!
//! # Architecture
//! - `source`: row sources ([`source::XmlCatalog`], [`source::MemorySource`])
//! - `inference`: type guessing and the cached [`inference::SchemaInferrer`]
//! - `ddl`, `drift`, `upsert`: SQL generation, drift detection, batched upserts
//! - `adapters`: destination stores behind [`adapters::DestinationStore`]
//! - `service`: [`service::CatalogSync`], the table-level operations

pub mod adapters;
pub mod config;
pub mod ddl;
pub mod drift;
pub mod error;
pub mod identifier;
pub mod inference;
pub mod logging;
pub mod models;
pub mod service;
pub mod source;
pub mod upsert;

// Re-export commonly used types
pub use adapters::{ConnectionConfig, DestinationStore, MemoryStore, create_store};
#[cfg(feature = "postgresql")]
pub use adapters::PostgresStore;
pub use config::{TableConfig, TableRegistry};
pub use ddl::AlterPlan;
pub use error::{FeedSyncError, Result};
pub use inference::SchemaInferrer;
pub use models::{BoundValue, Row, Schema, SchemaColumn, SqlType};
pub use service::{CatalogSync, UpsertSummary};
pub use source::{MemorySource, RowSource, XmlCatalog};
