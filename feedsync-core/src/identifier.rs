//! Identifier gate for SQL text.
//!
//! Table and column names cannot be bound as parameters the way row values
//! can, so every name that is concatenated into generated SQL must pass
//! through [`quote_identifier`] first. Only plain identifiers are accepted:
//! an ASCII letter or underscore followed by ASCII letters, digits or
//! underscores. Anything else is rejected outright rather than escaped.

use crate::{Result, error::FeedSyncError};
use regex::Regex;
use std::sync::OnceLock;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid identifier pattern")
    })
}

/// Returns true if `name` is a plain SQL identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Checks `name` against the identifier pattern without quoting it.
///
/// # Errors
/// Returns `FeedSyncError::InvalidIdentifier` for empty names, names starting
/// with a digit, and names containing whitespace, quotes or punctuation.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if is_valid_identifier(name) {
        Ok(name)
    } else {
        Err(FeedSyncError::invalid_identifier(name))
    }
}

/// Validates `name` and wraps it in double quotes for embedding in SQL.
///
/// # Example
/// ```rust
/// use feedsync_core::identifier::quote_identifier;
///
/// assert_eq!(quote_identifier("orders").unwrap(), "\"orders\"");
/// assert!(quote_identifier("order;drop").is_err());
/// ```
pub fn quote_identifier(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name))
}
