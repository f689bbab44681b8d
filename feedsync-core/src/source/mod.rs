//! Row sources: where flattened catalog rows come from.
//!
//! # Module Structure
//! - `tree`: generic element abstraction and the flattening rule
//! - `xml`: catalog documents parsed with roxmltree
//!
//! [`MemorySource`] serves rows handed to it directly, which is how tests and
//! embedding applications bypass document parsing.

mod tree;
mod xml;

pub use tree::{CatalogNode, Element, flatten_node};
pub use xml::XmlCatalog;

use crate::models::Row;
use crate::{Result, error::FeedSyncError};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Supplies ordered rows per logical table.
pub trait RowSource: Send + Sync {
    /// Table names in a stable order.
    fn table_names(&self) -> Vec<String>;

    /// Reads every row of `table`.
    ///
    /// # Errors
    /// Returns `UnknownTable` for tables the source does not know and
    /// `Source` errors for I/O or parse failures.
    fn read_rows(&self, table: &str) -> Result<Vec<Row>>;
}

#[derive(Debug)]
struct MemoryTable {
    name: String,
    rows: Vec<Row>,
    reads: AtomicUsize,
}

/// Row source backed by rows held in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: Vec<MemoryTable>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a table.
    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        let name = name.into();
        self.tables.retain(|t| t.name != name);
        self.tables.push(MemoryTable {
            name,
            rows,
            reads: AtomicUsize::new(0),
        });
        self
    }

    /// How many times `read_rows` has served `table`.
    pub fn read_count(&self, table: &str) -> usize {
        self.tables
            .iter()
            .find(|t| t.name == table)
            .map_or(0, |t| t.reads.load(Ordering::Relaxed))
    }
}

impl RowSource for MemorySource {
    fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    fn read_rows(&self, table: &str) -> Result<Vec<Row>> {
        let entry = self
            .tables
            .iter()
            .find(|t| t.name == table)
            .ok_or_else(|| FeedSyncError::unknown_table(table, self.table_names()))?;
        entry.reads.fetch_add(1, Ordering::Relaxed);
        Ok(entry.rows.clone())
    }
}
