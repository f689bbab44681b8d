//! Per-table configuration.
//!
//! The identity column of a table is a naming convention of the feed, not
//! something that can be derived from its data, so it is supplied here
//! explicitly together with where the table's rows live in the document.

use crate::identifier::validate_identifier;
use crate::{Result, error::FeedSyncError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one logical table.
///
/// # Example
/// ```rust
/// use feedsync_core::config::TableConfig;
///
/// let offers = TableConfig::new("offers", ["shop", "offers", "offer"])
///     .with_identity_column("vendorCode");
///
/// assert_eq!(offers.identity_column.as_deref(), Some("vendorCode"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Destination table name
    pub name: String,
    /// Element path below the document root to the repeated row element
    pub path: Vec<String>,
    /// Conflict key for upserts
    #[serde(default)]
    pub identity_column: Option<String>,
    /// Column receiving a row element's own text, if it has any
    #[serde(default)]
    pub text_column: Option<String>,
}

impl TableConfig {
    /// Creates a table config without identity or text column.
    pub fn new<I, P>(name: impl Into<String>, path: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            name: name.into(),
            path: path.into_iter().map(Into::into).collect(),
            identity_column: None,
            text_column: None,
        }
    }

    /// Builder method to set the identity column.
    pub fn with_identity_column(mut self, column: impl Into<String>) -> Self {
        self.identity_column = Some(column.into());
        self
    }

    /// Builder method to set the text column.
    pub fn with_text_column(mut self, column: impl Into<String>) -> Self {
        self.text_column = Some(column.into());
        self
    }

    /// Validates names and path.
    ///
    /// # Errors
    /// Returns error if the table name or identity column fails the identifier
    /// gate, or the element path is empty.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FeedSyncError::configuration("table name is required"));
        }
        validate_identifier(&self.name)?;
        if let Some(identity) = &self.identity_column {
            validate_identifier(identity)?;
        }
        if self.path.is_empty() || self.path.iter().any(|step| step.trim().is_empty()) {
            return Err(FeedSyncError::configuration(format!(
                "table '{}' needs a non-empty element path",
                self.name
            )));
        }
        Ok(())
    }
}

/// Ordered, validated set of table configurations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TableConfig>", into = "Vec<TableConfig>")]
pub struct TableRegistry {
    tables: Vec<TableConfig>,
}

impl TableRegistry {
    /// Builds a registry, validating every entry.
    ///
    /// # Errors
    /// Returns error for an empty registry, an invalid entry, or a duplicate
    /// table name.
    pub fn new(tables: Vec<TableConfig>) -> Result<Self> {
        if tables.is_empty() {
            return Err(FeedSyncError::configuration(
                "at least one table must be configured",
            ));
        }
        for (index, table) in tables.iter().enumerate() {
            table.validate()?;
            if tables[..index].iter().any(|t| t.name == table.name) {
                return Err(FeedSyncError::configuration(format!(
                    "table '{}' is configured more than once",
                    table.name
                )));
            }
        }
        Ok(Self { tables })
    }

    /// Standard product-feed layout: currencies, categories and offers.
    pub fn catalog_defaults() -> Self {
        Self {
            tables: vec![
                TableConfig::new("currency", ["shop", "currencies", "currency"])
                    .with_identity_column("id"),
                TableConfig::new("categories", ["shop", "categories", "category"])
                    .with_identity_column("id")
                    .with_text_column("value"),
                TableConfig::new("offers", ["shop", "offers", "offer"])
                    .with_identity_column("vendorCode"),
            ],
        }
    }

    /// Loads a registry from a JSON array of table configs.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid JSON, or fails validation.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            FeedSyncError::io(format!("Failed to read table config {}", path.display()), e)
        })?;
        Self::from_json_str(&text)
    }

    /// Parses a registry from a JSON array of table configs.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let tables: Vec<TableConfig> = serde_json::from_str(text).map_err(|e| {
            FeedSyncError::configuration(format!("Invalid table config JSON: {}", e))
        })?;
        Self::new(tables)
    }

    /// Table names in configured order.
    pub fn names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableConfig> {
        self.tables.iter()
    }

    /// Looks up a table by name.
    pub fn get(&self, name: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Looks up a table, failing with the allowed names when it is unknown.
    ///
    /// # Errors
    /// Returns `Configuration` for a blank name and `UnknownTable` otherwise.
    pub fn require(&self, name: &str) -> Result<&TableConfig> {
        if name.trim().is_empty() {
            return Err(FeedSyncError::configuration("table name is required"));
        }
        self.get(name)
            .ok_or_else(|| FeedSyncError::unknown_table(name, self.names()))
    }
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::catalog_defaults()
    }
}

impl TryFrom<Vec<TableConfig>> for TableRegistry {
    type Error = FeedSyncError;

    fn try_from(tables: Vec<TableConfig>) -> Result<Self> {
        Self::new(tables)
    }
}

impl From<TableRegistry> for Vec<TableConfig> {
    fn from(registry: TableRegistry) -> Self {
        registry.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_defaults() {
        let registry = TableRegistry::catalog_defaults();
        assert_eq!(registry.names(), vec!["currency", "categories", "offers"]);
        assert_eq!(
            registry.get("offers").unwrap().identity_column.as_deref(),
            Some("vendorCode")
        );
        assert_eq!(
            registry.get("categories").unwrap().text_column.as_deref(),
            Some("value")
        );
        assert_eq!(registry.get("currency").unwrap().text_column, None);
    }

    #[test]
    fn test_defaults_pass_validation() {
        let tables: Vec<TableConfig> = TableRegistry::catalog_defaults().into();
        assert!(TableRegistry::new(tables).is_ok());
    }

    #[test]
    fn test_require_unknown_table() {
        let registry = TableRegistry::catalog_defaults();
        let error = registry.require("orders").unwrap_err();
        assert!(matches!(error, FeedSyncError::UnknownTable { .. }));
        assert!(error.to_string().contains("currency, categories, offers"));

        assert!(matches!(
            registry.require("  ").unwrap_err(),
            FeedSyncError::Configuration { .. }
        ));
    }

    #[test]
    fn test_registry_rejects_duplicates_and_bad_names() {
        let duplicate = vec![
            TableConfig::new("offers", ["shop", "offers", "offer"]),
            TableConfig::new("offers", ["shop", "offers", "offer"]),
        ];
        assert!(TableRegistry::new(duplicate).is_err());

        let bad_name = vec![TableConfig::new("offers;drop", ["shop"])];
        assert!(matches!(
            TableRegistry::new(bad_name).unwrap_err(),
            FeedSyncError::InvalidIdentifier { .. }
        ));

        let bad_identity =
            vec![TableConfig::new("offers", ["shop"]).with_identity_column("vendor code")];
        assert!(TableRegistry::new(bad_identity).is_err());

        let no_path = vec![TableConfig::new("offers", Vec::<String>::new())];
        assert!(TableRegistry::new(no_path).is_err());

        assert!(TableRegistry::new(Vec::new()).is_err());
    }

    #[test]
    fn test_registry_from_json() {
        let json = r#"[
            {"name": "items", "path": ["store", "items", "item"], "identity_column": "sku"},
            {"name": "groups", "path": ["store", "groups", "group"], "text_column": "label"}
        ]"#;
        let registry = TableRegistry::from_json_str(json).unwrap();

        assert_eq!(registry.names(), vec!["items", "groups"]);
        assert_eq!(registry.get("items").unwrap().identity_column.as_deref(), Some("sku"));
        assert_eq!(registry.get("groups").unwrap().identity_column, None);
    }

    #[test]
    fn test_registry_from_invalid_json() {
        assert!(matches!(
            TableRegistry::from_json_str("{not json").unwrap_err(),
            FeedSyncError::Configuration { .. }
        ));
        assert!(TableRegistry::from_json_str(r#"[{"name": "a b", "path": ["x"]}]"#).is_err());
    }
}
