//! CLI module for aeroquery
//!
//! Provides command-line interface for:
//! - run: One-shot query execution over a JSON data file
//! - explain: One-shot rewrite without execution

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, QueryArgs};
pub use commands::{execute, explain, load_session, run_command, Session};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_json_file, write_response};

/// Parse arguments, run the command and print its response
pub async fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let data = run_command(cli.command).await?;
    write_response(data)
}
