//! DDL rendering from an inferred schema.
//!
//! Only additive changes are ever generated. A column that disappeared from
//! the source or changed type is left to [`crate::drift`] to report.

use crate::identifier::quote_identifier;
use crate::models::Schema;
use crate::Result;
use std::collections::BTreeSet;
use std::fmt;

/// Marker rendered when no columns are missing.
pub const NO_CHANGES: &str = "-- no changes\n";

/// Renders `CREATE TABLE IF NOT EXISTS` for `schema`.
///
/// A named primary-key constraint `pk_<table>` is added when the identity
/// column is part of the schema. Every name is passed through the
/// identifier gate before rendering.
///
/// # Example
/// ```rust
/// use feedsync_core::ddl::create_table_sql;
/// use feedsync_core::models::{Schema, SqlType};
///
/// let schema = Schema::new("currency")
///     .with_column("id", SqlType::Text)
///     .with_column("rate", SqlType::BigInt);
///
/// assert_eq!(
///     create_table_sql("currency", &schema, Some("id")).unwrap(),
///     "CREATE TABLE IF NOT EXISTS \"currency\" (\n  \"id\" text,\n  \"rate\" bigint,\n  CONSTRAINT \"pk_currency\" PRIMARY KEY (\"id\")\n);\n"
/// );
/// ```
///
/// # Errors
/// Returns `InvalidIdentifier` if the table, a column, or the derived
/// constraint name fails the identifier gate.
pub fn create_table_sql(table: &str, schema: &Schema, identity_column: Option<&str>) -> Result<String> {
    let mut lines = Vec::with_capacity(schema.len().saturating_add(1));
    for column in &schema.columns {
        lines.push(format!(
            "  {} {}",
            quote_identifier(&column.name)?,
            column.sql_type.ddl()
        ));
    }

    if let Some(identity) = identity_column.filter(|id| schema.contains(id)) {
        lines.push(format!(
            "  CONSTRAINT {} PRIMARY KEY ({})",
            quote_identifier(&format!("pk_{}", table))?,
            quote_identifier(identity)?
        ));
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);\n",
        quote_identifier(table)?,
        lines.join(",\n")
    ))
}

/// Columns that must be added to bring a destination table up to the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterPlan {
    /// Destination already has every schema column
    NoChanges,
    /// One `ALTER TABLE ... ADD COLUMN` statement per missing column, in schema order
    AddColumns(Vec<String>),
}

impl AlterPlan {
    pub fn is_empty(&self) -> bool {
        matches!(self, AlterPlan::NoChanges)
    }

    /// The individual statements, without trailing newlines.
    pub fn statements(&self) -> &[String] {
        match self {
            AlterPlan::NoChanges => &[],
            AlterPlan::AddColumns(statements) => statements,
        }
    }
}

impl fmt::Display for AlterPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlterPlan::NoChanges => f.write_str(NO_CHANGES),
            AlterPlan::AddColumns(statements) => {
                for statement in statements {
                    writeln!(f, "{}", statement)?;
                }
                Ok(())
            }
        }
    }
}

/// Plans `ALTER TABLE ... ADD COLUMN` for schema columns missing from `existing`.
///
/// # Errors
/// Returns `InvalidIdentifier` if the table or a missing column fails the
/// identifier gate.
pub fn alter_table_plan(table: &str, schema: &Schema, existing: &BTreeSet<String>) -> Result<AlterPlan> {
    let missing: Vec<_> = schema
        .columns
        .iter()
        .filter(|column| !existing.contains(&column.name))
        .collect();

    if missing.is_empty() {
        return Ok(AlterPlan::NoChanges);
    }

    let quoted_table = quote_identifier(table)?;
    let statements = missing
        .into_iter()
        .map(|column| {
            Ok(format!(
                "ALTER TABLE {} ADD COLUMN {} {};",
                quoted_table,
                quote_identifier(&column.name)?,
                column.sql_type.ddl()
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AlterPlan::AddColumns(statements))
}
