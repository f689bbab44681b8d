//! Catalog feed synchronization tool.
//!
//! Reads a product catalog document, infers one relational table per
//! configured section, and creates, verifies and upserts those tables in
//! PostgreSQL.

mod commands;
mod shell;

use anyhow::Context;
use clap::{Args, Parser};
use commands::{Command, execute};
use feedsync_core::{
    CatalogSync, DestinationStore, MemoryStore, RowSource, TableRegistry, XmlCatalog,
    create_store, error::redact_database_url, logging::init_logging,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "feedsync")]
#[command(about = "Sync product catalog feeds into PostgreSQL tables")]
#[command(version)]
#[command(long_about = "
feedsync - catalog feed to relational table sync

Each configured catalog section (currencies, categories, offers by default)
becomes one table. Column types are inferred from the values in the feed,
the table is created if missing, its structure is checked against the
inferred schema, and every row is upserted by its identity column in a
single transaction.

A table whose columns no longer match the feed is never altered
automatically: use `ddl-change` to review and `ddl-change --apply` to add
new columns.

EXAMPLES:
  feedsync --source catalog.xml ddl offers
  feedsync --source catalog.xml --database-url postgres://loader@localhost/shop update
  feedsync --source catalog.xml update --dry-run
  feedsync --source https://shop.example.com/feed.xml --database-url postgres://loader@localhost/shop update
  feedsync --source catalog.xml --database-url postgres://loader@localhost/shop shell
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Catalog document
    #[arg(
        long,
        env = "FEEDSYNC_SOURCE",
        global = true,
        help = "Catalog file path, file:// URL, or http(s):// feed URL"
    )]
    pub source: Option<String>,

    /// Destination connection URL
    #[arg(
        long,
        env = "DATABASE_URL",
        global = true,
        hide_env_values = true,
        help = "Destination connection string (credentials are redacted in logs)"
    )]
    pub database_url: Option<String>,

    /// Table layout
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "JSON file with table configs (defaults to currency, categories, offers)"
    )]
    pub tables: Option<PathBuf>,

    /// Use an in-memory destination
    #[arg(
        long,
        global = true,
        help = "Run against an in-memory store and print the DDL that would run"
    )]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all log output except errors")]
    pub quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose, cli.global.quiet)?;
    run(cli).await
}

fn load_tables(path: Option<&Path>) -> anyhow::Result<TableRegistry> {
    match path {
        Some(path) => TableRegistry::from_json_file(path)
            .with_context(|| format!("Failed to load table config {}", path.display())),
        None => Ok(TableRegistry::catalog_defaults()),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let tables = load_tables(cli.tables.as_deref())?;
    let location = cli
        .source
        .as_deref()
        .context("--source or FEEDSYNC_SOURCE is required")?;
    let catalog = XmlCatalog::load(location, tables.clone())
        .await
        .with_context(|| format!("Failed to load catalog {}", location))?;

    if cli.dry_run {
        info!("Dry run: nothing is written to the database");
        let mut sync = CatalogSync::new(catalog, MemoryStore::new(), tables);
        dispatch(&mut sync, &cli.command).await?;

        let statements = sync.store().executed_statements().await;
        println!("-- dry run: {} DDL statement(s)", statements.len());
        for statement in statements {
            println!("{}", statement.trim_end());
        }
        return Ok(());
    }

    match cli.database_url.as_deref() {
        Some(url) => {
            info!("Destination: {}", redact_database_url(url));
            let store = create_store(url)?;
            let mut sync = CatalogSync::new(catalog, store, tables);
            dispatch(&mut sync, &cli.command).await
        }
        None if !cli.command.needs_destination() => {
            let mut sync = CatalogSync::new(catalog, MemoryStore::new(), tables);
            dispatch(&mut sync, &cli.command).await
        }
        None => anyhow::bail!("--database-url or DATABASE_URL is required (or pass --dry-run)"),
    }
}

async fn dispatch<S, D>(sync: &mut CatalogSync<S, D>, command: &Command) -> anyhow::Result<()>
where
    S: RowSource,
    D: DestinationStore,
{
    if *command == Command::Shell {
        return shell::run(sync).await;
    }
    let output = execute(sync, command).await?;
    println!("{}", output.trim_end());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_update_with_dry_run() {
        let cli = Cli::try_parse_from([
            "feedsync",
            "--source",
            "catalog.xml",
            "update",
            "offers",
            "--dry-run",
        ])
        .unwrap();

        assert!(cli.dry_run);
        assert_eq!(cli.source.as_deref(), Some("catalog.xml"));
        assert_eq!(
            cli.command,
            Command::Update {
                table: Some("offers".to_string())
            }
        );
    }

    #[test]
    fn test_cli_verbosity_flags() {
        let cli = Cli::try_parse_from(["feedsync", "-vv", "tables"]).unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert!(!cli.global.quiet);
    }

    #[test]
    fn test_cli_is_id_requires_column() {
        assert!(Cli::try_parse_from(["feedsync", "is-id", "offers"]).is_err());
        let cli = Cli::try_parse_from(["feedsync", "is-id", "offers", "vendorCode"]).unwrap();
        assert!(matches!(cli.command, Command::IsId { .. }));
    }

    #[test]
    fn test_cli_ddl_change_apply() {
        let cli = Cli::try_parse_from(["feedsync", "ddl-change", "offers", "--apply"]).unwrap();
        assert_eq!(
            cli.command,
            Command::DdlChange {
                table: "offers".to_string(),
                apply: true
            }
        );
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["feedsync"]).is_err());
    }

    #[test]
    fn test_load_default_tables() {
        let tables = load_tables(None).unwrap();
        assert_eq!(tables.names(), vec!["currency", "categories", "offers"]);
    }
}
