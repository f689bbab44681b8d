//! Destination connection settings.

use crate::{Result, error::FeedSyncError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for a pooled destination connection.
///
/// # Security
/// Passwords are never stored here. `Display` omits the username too, so a
/// config can be logged as is.
///
/// # Example
/// ```rust
/// use feedsync_core::adapters::ConnectionConfig;
///
/// let config = ConnectionConfig::new("localhost".to_string())
///     .with_port(5432)
///     .with_database("catalog".to_string())
///     .with_username("loader".to_string());
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.to_string(), "ConnectionConfig(localhost:5432/catalog)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host address
    pub host: String,
    /// Optional port number
    pub port: Option<u16>,
    /// Optional database name
    pub database: Option<String>,
    /// Optional username (password handled by the driver only)
    pub username: Option<String>,
    /// Pool acquire timeout
    pub connect_timeout: Duration,
    /// Server-side `statement_timeout` applied to every session
    pub statement_timeout: Duration,
    /// Server-side `lock_timeout` applied to every session
    pub lock_timeout: Duration,
    /// Maximum number of pooled connections
    pub max_connections: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            database: None,
            username: None,
            connect_timeout: Duration::from_secs(30),
            statement_timeout: Duration::from_secs(300),
            lock_timeout: Duration::from_secs(30),
            max_connections: 4,
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ConnectionConfig({}{}{})",
            self.host,
            self.port.map_or_else(String::new, |p| format!(":{}", p)),
            self.database
                .as_ref()
                .map_or_else(String::new, |db| format!("/{}", db))
        )
    }
}

impl ConnectionConfig {
    /// Creates a config for `host` with default limits.
    pub fn new(host: String) -> Self {
        Self {
            host,
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_database(mut self, database: String) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_username(mut self, username: String) -> Self {
        self.username = Some(username);
        self
    }

    /// Checks that limits and timeouts are usable.
    ///
    /// # Errors
    /// Returns a `Configuration` error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(FeedSyncError::configuration("host cannot be empty"));
        }

        if self.port == Some(0) {
            return Err(FeedSyncError::configuration("port must be greater than 0"));
        }

        if self.max_connections == 0 {
            return Err(FeedSyncError::configuration(
                "max_connections must be greater than 0",
            ));
        }

        if self.max_connections > 100 {
            return Err(FeedSyncError::configuration(
                "max_connections should not exceed 100",
            ));
        }

        for (name, timeout) in [
            ("connect_timeout", self.connect_timeout),
            ("statement_timeout", self.statement_timeout),
            ("lock_timeout", self.lock_timeout),
        ] {
            if timeout.is_zero() {
                return Err(FeedSyncError::configuration(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        Ok(())
    }
}
