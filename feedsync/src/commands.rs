//! Subcommands shared by the one-shot CLI and the interactive shell.

use clap::Subcommand;
use feedsync_core::{
    CatalogSync, DestinationStore, FeedSyncError, Result, RowSource, UpsertSummary,
};

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List configured tables
    Tables,
    /// Print the CREATE TABLE statement inferred for a table
    Ddl {
        /// Table name
        table: String,
    },
    /// Print the inferred column names of a table
    Columns {
        /// Table name
        table: String,
    },
    /// Create, verify and upsert one table, or every table when omitted
    Update {
        /// Table name
        table: Option<String>,
    },
    /// Check whether a column is non-null and unique in every row
    #[command(alias = "isid")]
    IsId {
        /// Table name
        table: String,
        /// Column name
        column: String,
    },
    /// Print the ALTER TABLE statements needed for new source columns
    #[command(alias = "ddlchange")]
    DdlChange {
        /// Table name
        table: String,
        /// Execute the statements instead of only printing them
        #[arg(long)]
        apply: bool,
    },
    /// Read commands line by line from stdin
    Shell,
}

impl Command {
    /// Commands that read from or write to the destination.
    pub fn needs_destination(&self) -> bool {
        matches!(
            self,
            Command::Update { .. } | Command::DdlChange { .. } | Command::Shell
        )
    }
}

fn format_list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

fn format_summary(summary: &UpsertSummary) -> String {
    format!(
        "OK: updated {} ({} written, {} skipped)",
        summary.table, summary.rows_written, summary.rows_skipped
    )
}

/// Runs one command and returns the text to print.
pub async fn execute<S, D>(sync: &mut CatalogSync<S, D>, command: &Command) -> Result<String>
where
    S: RowSource,
    D: DestinationStore,
{
    match command {
        Command::Tables => Ok(format_list(&sync.table_names())),
        Command::Ddl { table } => sync.table_ddl(table),
        Command::Columns { table } => Ok(format_list(&sync.column_names(table)?)),
        Command::Update { table: Some(table) } => {
            let summary = sync.update(table).await?;
            Ok(format_summary(&summary))
        }
        Command::Update { table: None } => {
            let summaries = sync.update_all().await?;
            let mut lines: Vec<String> = summaries.iter().map(format_summary).collect();
            lines.push("OK: updated all".to_string());
            Ok(lines.join("\n"))
        }
        Command::IsId { table, column } => Ok(sync.is_column_id(table, column)?.to_string()),
        Command::DdlChange {
            table,
            apply: false,
        } => Ok(sync.ddl_change(table).await?.to_string()),
        Command::DdlChange { table, apply: true } => {
            let plan = sync.apply_ddl_change(table).await?;
            Ok(format!(
                "{}OK: applied {} statement(s)",
                plan,
                plan.statements().len()
            ))
        }
        Command::Shell => Err(FeedSyncError::configuration(
            "already in the interactive shell",
        )),
    }
}
