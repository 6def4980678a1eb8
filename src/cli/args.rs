//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroquery run --model <path> --data <path> --query <path>
//! - aeroquery explain --model <path> --data <path> --query <path>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// aeroquery - query tree rewriting over schema models
#[derive(Parser, Debug)]
#[command(name = "aeroquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rewrite and execute a query, printing the result
    Run(QueryArgs),

    /// Rewrite a query and print the rewritten tree without executing it
    Explain(QueryArgs),
}

/// Inputs shared by every command
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Path to the model document
    #[arg(long)]
    pub model: PathBuf,

    /// Path to the data file: an object of collection name to rows
    #[arg(long)]
    pub data: PathBuf,

    /// Path to the query description
    #[arg(long)]
    pub query: PathBuf,

    /// Path to the engine configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run as this authenticated user
    #[arg(long, conflicts_with = "service_role")]
    pub user: Option<Uuid>,

    /// Run with the service role, bypassing read policies and row security
    #[arg(long)]
    pub service_role: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
