//! Interactive shell: the same subcommands, one per line.

use crate::commands::{Command, execute};
use clap::Parser;
use feedsync_core::{CatalogSync, DestinationStore, FeedSyncError, RowSource};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const BANNER: &str = "Interactive mode. Type 'help' for commands, 'exit' to leave.";

const HELP: &str = "\
tables
ddl <table>
columns <table>
update [table]
is-id <table> <column>
ddl-change <table> [--apply]
help
exit";

#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_help_flag = true, disable_help_subcommand = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

/// One parsed line of shell input.
#[derive(Debug, PartialEq, Eq)]
pub enum ShellInput {
    Empty,
    Exit,
    Help,
    Command(Command),
    Invalid(String),
}

/// Parses a shell line. The command word is case-insensitive.
pub fn parse_line(line: &str) -> ShellInput {
    let mut words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    let Some(first) = words.first_mut() else {
        return ShellInput::Empty;
    };
    *first = first.to_lowercase();

    match first.as_str() {
        "exit" | "quit" => ShellInput::Exit,
        "help" => ShellInput::Help,
        _ => match ShellLine::try_parse_from(&words) {
            Ok(parsed) => ShellInput::Command(parsed.command),
            Err(e) => {
                let rendered = e.to_string();
                let message = rendered
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .trim_start_matches("error: ");
                ShellInput::Invalid(format!("{}. Type: help", message))
            }
        },
    }
}

/// Renders a failed command with its full cause chain.
pub fn render_error(error: FeedSyncError) -> String {
    format!("ERROR: {:#}", anyhow::Error::from(error))
}

/// Runs the shell until `exit` or end of input.
///
/// Command failures are printed as `ERROR: <message>` and do not end the loop.
pub async fn run<S, D>(sync: &mut CatalogSync<S, D>) -> anyhow::Result<()>
where
    S: RowSource,
    D: DestinationStore,
{
    println!("{}", BANNER);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_line(&line) {
            ShellInput::Empty => {}
            ShellInput::Exit => break,
            ShellInput::Help => println!("{}", HELP),
            ShellInput::Invalid(message) => println!("ERROR: {}", message),
            ShellInput::Command(command) => match execute(sync, &command).await {
                Ok(output) => println!("{}", output.trim_end()),
                Err(e) => {
                    tracing::debug!("Shell command failed: {:?}", e);
                    println!("{}", render_error(e));
                }
            },
        }
    }

    Ok(())
}
