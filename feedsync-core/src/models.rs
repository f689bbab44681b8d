//! Core data models for catalog rows and inferred relational schemas.
//!
//! A [`Row`] is one flattened catalog element, a [`Schema`] is the ordered
//! column-to-type map inferred from all rows of a table, and [`SqlType`]
//! carries both the DDL keyword and the bind rule for each column type.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

/// Relational column types the inferrer can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    BigInt,
    Integer,
    Decimal,
    Boolean,
    Text,
    Varchar,
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlType::BigInt => write!(f, "BIGINT"),
            SqlType::Integer => write!(f, "INTEGER"),
            SqlType::Decimal => write!(f, "DECIMAL"),
            SqlType::Boolean => write!(f, "BOOLEAN"),
            SqlType::Text => write!(f, "TEXT"),
            SqlType::Varchar => write!(f, "VARCHAR"),
        }
    }
}

/// Raw value could not be converted to its column's native type.
#[derive(Debug, Error)]
pub enum ValueParseError {
    #[error("not a base-10 integer: {0}")]
    Integer(#[from] std::num::ParseIntError),
    #[error("not a decimal number: {0}")]
    Decimal(#[from] rust_decimal::Error),
}

/// Tokens that bind as boolean true; every other non-blank string is false.
const TRUE_TOKENS: &[&str] = &["1", "true", "yes", "y"];

impl SqlType {
    /// Keyword used for this type in generated DDL.
    pub fn ddl(self) -> &'static str {
        match self {
            SqlType::BigInt => "bigint",
            SqlType::Integer => "integer",
            SqlType::Decimal => "numeric",
            SqlType::Boolean => "boolean",
            SqlType::Text => "text",
            SqlType::Varchar => "varchar",
        }
    }

    /// Parses a DDL keyword back into a type, accepting common aliases.
    pub fn from_ddl(keyword: &str) -> Option<Self> {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "bigint" | "int8" => Some(SqlType::BigInt),
            "integer" | "int" | "int4" => Some(SqlType::Integer),
            "numeric" | "decimal" => Some(SqlType::Decimal),
            "boolean" | "bool" => Some(SqlType::Boolean),
            "text" => Some(SqlType::Text),
            "varchar" | "character varying" => Some(SqlType::Varchar),
            _ => None,
        }
    }

    /// Converts a raw value into a typed bind parameter.
    ///
    /// Absent and blank values bind as a NULL of this type. Everything else is
    /// trimmed and then parsed according to the type's rule.
    ///
    /// Boolean binding is permissive: anything outside `{1, true, yes, y}`
    /// (case-insensitive) is `false`, including garbage input.
    pub fn bind(self, raw: Option<&str>) -> Result<BoundValue, ValueParseError> {
        let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(BoundValue::Null(self));
        };

        let bound = match self {
            SqlType::BigInt => BoundValue::BigInt(value.parse::<i64>()?),
            SqlType::Integer => BoundValue::Integer(value.parse::<i32>()?),
            SqlType::Decimal => BoundValue::Decimal(parse_decimal(&value.replace(',', "."))?),
            SqlType::Boolean => {
                let lowered = value.to_lowercase();
                BoundValue::Boolean(TRUE_TOKENS.contains(&lowered.as_str()))
            }
            SqlType::Text | SqlType::Varchar => BoundValue::Text(value.to_string()),
        };

        Ok(bound)
    }
}

fn parse_decimal(value: &str) -> Result<Decimal, rust_decimal::Error> {
    if value.contains(['e', 'E']) {
        Decimal::from_scientific(value)
    } else {
        Decimal::from_str(value)
    }
}

/// A typed statement parameter produced by [`SqlType::bind`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoundValue {
    BigInt(i64),
    Integer(i32),
    Decimal(Decimal),
    Boolean(bool),
    Text(String),
    /// NULL carrying the column type it is bound for
    Null(SqlType),
}

impl BoundValue {
    /// Returns true for typed NULLs.
    pub fn is_null(&self) -> bool {
        matches!(self, BoundValue::Null(_))
    }
}

impl std::fmt::Display for BoundValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundValue::BigInt(v) => write!(f, "{}", v),
            BoundValue::Integer(v) => write!(f, "{}", v),
            BoundValue::Decimal(v) => write!(f, "{}", v),
            BoundValue::Boolean(v) => write!(f, "{}", v),
            BoundValue::Text(v) => write!(f, "{}", v),
            BoundValue::Null(_) => write!(f, "NULL"),
        }
    }
}

/// One flattened catalog element: column name to raw value, in first-seen order.
///
/// Inserting an existing key replaces the value but keeps the original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    entries: Vec<(String, Option<String>)>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: Option<String>) {
        let column = column.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Builder form of [`Row::insert`] for a present value.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, Some(value.into()));
        self
    }

    /// Builder form of [`Row::insert`] for an explicit null.
    pub fn with_null(mut self, column: impl Into<String>) -> Self {
        self.insert(column, None);
        self
    }

    /// Raw value of a column; `None` when the column is absent or null.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Whether the column key is present (even with a null value).
    pub fn contains_key(&self, column: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == column)
    }

    /// Column names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates over `(column, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for Row
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value.map(Into::into));
        }
        row
    }
}

/// A column of an inferred schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub sql_type: SqlType,
    /// 1-based position in first-seen order
    pub ordinal_position: u32,
}

/// Ordered column-name-to-type mapping for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub table_name: String,
    pub columns: Vec<SchemaColumn>,
}

impl Schema {
    /// Creates an empty schema for a table.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
        }
    }

    /// Appends a column unless one with the same name already exists.
    pub fn push(&mut self, name: impl Into<String>, sql_type: SqlType) {
        let name = name.into();
        if self.contains(&name) {
            return;
        }
        let ordinal_position = u32::try_from(self.columns.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        self.columns.push(SchemaColumn {
            name,
            sql_type,
            ordinal_position,
        });
    }

    /// Builder form of [`Schema::push`].
    pub fn with_column(mut self, name: impl Into<String>, sql_type: SqlType) -> Self {
        self.push(name, sql_type);
        self
    }

    /// Type of a column, if present.
    pub fn get(&self, name: &str) -> Option<SqlType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.sql_type)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Column names as a set, for comparison with a destination's columns.
    pub fn column_set(&self) -> BTreeSet<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_keywords() {
        assert_eq!(SqlType::BigInt.ddl(), "bigint");
        assert_eq!(SqlType::Integer.ddl(), "integer");
        assert_eq!(SqlType::Decimal.ddl(), "numeric");
        assert_eq!(SqlType::Boolean.ddl(), "boolean");
        assert_eq!(SqlType::Text.ddl(), "text");
        assert_eq!(SqlType::Varchar.ddl(), "varchar");
    }

    #[test]
    fn test_from_ddl_accepts_keywords_and_aliases() {
        for sql_type in [
            SqlType::BigInt,
            SqlType::Integer,
            SqlType::Decimal,
            SqlType::Boolean,
            SqlType::Text,
            SqlType::Varchar,
        ] {
            assert_eq!(SqlType::from_ddl(sql_type.ddl()), Some(sql_type));
        }
        assert_eq!(SqlType::from_ddl("INT8"), Some(SqlType::BigInt));
        assert_eq!(SqlType::from_ddl("jsonb"), None);
    }

    #[test]
    fn test_bind_blank_and_absent_are_typed_nulls() {
        assert_eq!(SqlType::BigInt.bind(None).unwrap(), BoundValue::Null(SqlType::BigInt));
        assert_eq!(
            SqlType::Boolean.bind(Some("   ")).unwrap(),
            BoundValue::Null(SqlType::Boolean)
        );
        assert_eq!(SqlType::Text.bind(Some("")).unwrap(), BoundValue::Null(SqlType::Text));
    }

    #[test]
    fn test_bind_integers() {
        assert_eq!(SqlType::BigInt.bind(Some(" -42 ")).unwrap(), BoundValue::BigInt(-42));
        assert_eq!(SqlType::Integer.bind(Some("7")).unwrap(), BoundValue::Integer(7));
        assert!(SqlType::BigInt.bind(Some("abc")).is_err());
        assert!(SqlType::BigInt.bind(Some("9.99")).is_err());
        // Out of range for a 32-bit column
        assert!(SqlType::Integer.bind(Some("3000000000")).is_err());
    }

    #[test]
    fn test_bind_decimal_normalizes_comma() {
        assert_eq!(
            SqlType::Decimal.bind(Some("9,99")).unwrap(),
            BoundValue::Decimal(Decimal::new(999, 2))
        );
        assert_eq!(
            SqlType::Decimal.bind(Some("1.5e2")).unwrap(),
            BoundValue::Decimal(Decimal::new(150, 0))
        );
        assert!(SqlType::Decimal.bind(Some("abc")).is_err());
    }

    #[test]
    fn test_bind_boolean_is_permissive() {
        for token in ["1", "true", "TRUE", "Yes", "y"] {
            assert_eq!(
                SqlType::Boolean.bind(Some(token)).unwrap(),
                BoundValue::Boolean(true),
                "{token}"
            );
        }
        for token in ["0", "false", "no", "garbage"] {
            assert_eq!(
                SqlType::Boolean.bind(Some(token)).unwrap(),
                BoundValue::Boolean(false),
                "{token}"
            );
        }
    }

    #[test]
    fn test_bind_text_is_trimmed_verbatim() {
        assert_eq!(
            SqlType::Text.bind(Some("  Red <b>shoe</b> ")).unwrap(),
            BoundValue::Text("Red <b>shoe</b>".to_string())
        );
    }

    #[test]
    fn test_row_insert_keeps_first_position() {
        let mut row = Row::new().with("id", "1").with("name", "a");
        row.insert("id", Some("2".to_string()));

        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(row.get("id"), Some("2"));
    }

    #[test]
    fn test_row_null_and_absent() {
        let row = Row::new().with_null("picture");
        assert!(row.contains_key("picture"));
        assert_eq!(row.get("picture"), None);
        assert!(!row.contains_key("missing"));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_schema_push_ignores_duplicates() {
        let schema = Schema::new("offers")
            .with_column("id", SqlType::BigInt)
            .with_column("name", SqlType::Text)
            .with_column("id", SqlType::Text);

        assert_eq!(schema.column_names(), vec!["id", "name"]);
        assert_eq!(schema.get("id"), Some(SqlType::BigInt));
        assert_eq!(schema.columns[1].ordinal_position, 2);
    }
}
