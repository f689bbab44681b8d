//! PostgreSQL connection string parsing and pool setup.

use super::PostgresStore;
use crate::adapters::ConnectionConfig;
use crate::{Result, error::FeedSyncError, error::redact_database_url};
use sqlx::PgPool;
use std::time::Duration;
use url::Url;

/// Longest timeout accepted from a connection string.
const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

impl PostgresStore {
    /// Parses a connection string into a [`ConnectionConfig`].
    ///
    /// Recognized query parameters: `connect_timeout` (seconds),
    /// `statement_timeout` (milliseconds), `lock_timeout` (milliseconds) and
    /// `pool_max_conns`. Out-of-range values are ignored and the default kept.
    ///
    /// # Errors
    /// Returns a `Configuration` error if the string is malformed, uses
    /// another scheme, or names an invalid database or role.
    pub fn parse_connection_config(connection_string: &str) -> Result<ConnectionConfig> {
        let url = Self::validate_connection_string(connection_string)?;

        let mut config = ConnectionConfig::new(url.host_str().unwrap_or("localhost").to_string())
            .with_port(url.port().unwrap_or(5432));

        let database = url.path().trim_start_matches('/');
        if !database.is_empty() {
            validate_pg_name("Database name", database)?;
            config = config.with_database(database.to_string());
        }

        let username = url.username();
        if !username.is_empty() {
            validate_pg_name("Username", username)?;
            config = config.with_username(username.to_string());
        }

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "connect_timeout" => {
                    if let Some(timeout) = parse_timeout(&value, Duration::from_secs) {
                        config.connect_timeout = timeout;
                    }
                }
                "statement_timeout" => {
                    if let Some(timeout) = parse_timeout(&value, Duration::from_millis) {
                        config.statement_timeout = timeout;
                    }
                }
                "lock_timeout" => {
                    if let Some(timeout) = parse_timeout(&value, Duration::from_millis) {
                        config.lock_timeout = timeout;
                    }
                }
                "pool_max_conns" => {
                    if let Ok(max_conns) = value.parse::<u32>()
                        && max_conns > 0
                        && max_conns <= 100
                    {
                        config.max_connections = max_conns;
                    }
                }
                _ => {}
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks scheme and host of a connection string.
    ///
    /// # Errors
    /// Returns a `Configuration` error; the message never contains the
    /// password.
    pub fn validate_connection_string(connection_string: &str) -> Result<Url> {
        let url = Url::parse(connection_string).map_err(|e| {
            FeedSyncError::configuration(format!(
                "Invalid PostgreSQL connection string format: {}",
                e
            ))
        })?;

        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(FeedSyncError::configuration(
                "Connection string must use postgres:// or postgresql:// scheme",
            ));
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(FeedSyncError::configuration(
                "Connection string must specify a host",
            ));
        }

        Ok(url)
    }

    /// Builds a lazily connected pool with per-session timeouts.
    pub(crate) fn create_connection_pool(
        connection_string: &str,
        config: &ConnectionConfig,
    ) -> Result<PgPool> {
        use sqlx::Executor;

        let statement_timeout_ms = config.statement_timeout.as_millis();
        let lock_timeout_ms = config.lock_timeout.as_millis();

        sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections.min(100))
            .acquire_timeout(config.connect_timeout)
            .test_before_acquire(true)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(
                        format!("SET statement_timeout = {}", statement_timeout_ms).as_str(),
                    )
                    .await?;
                    conn.execute(format!("SET lock_timeout = {}", lock_timeout_ms).as_str())
                        .await?;

                    let app_name = format!("feedsync-{}", env!("CARGO_PKG_VERSION"));
                    conn.execute(format!("SET application_name = '{}'", app_name).as_str())
                        .await?;
                    Ok(())
                })
            })
            .connect_lazy(connection_string)
            .map_err(|e| {
                FeedSyncError::destination_failed(
                    format!(
                        "Failed to create PostgreSQL connection pool to {}",
                        redact_database_url(connection_string)
                    ),
                    e,
                )
            })
    }
}

fn parse_timeout(value: &str, unit: fn(u64) -> Duration) -> Option<Duration> {
    value
        .parse::<u64>()
        .ok()
        .map(unit)
        .filter(|timeout| !timeout.is_zero() && *timeout <= MAX_TIMEOUT)
}

/// PostgreSQL database and role names: letter or underscore, then letters,
/// digits, underscores or dollar signs, at most 63 bytes.
fn validate_pg_name(kind: &str, name: &str) -> Result<()> {
    if name.len() > 63 {
        return Err(FeedSyncError::configuration(format!(
            "{} too long: maximum 63 characters",
            kind
        )));
    }

    let mut chars = name.chars();
    if !chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    {
        return Err(FeedSyncError::configuration(format!(
            "{} must start with a letter or underscore",
            kind
        )));
    }

    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return Err(FeedSyncError::configuration(format!(
            "{} contains invalid characters",
            kind
        )));
    }

    Ok(())
}
