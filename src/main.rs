//! aeroquery CLI entry point
//!
//! This is a minimal entrypoint that:
//! 1. Parses CLI arguments (via cli::run)
//! 2. Dispatches to CLI commands (via cli::run)
//! 3. Prints errors to stderr
//! 4. Exits with non-zero on failure

use aeroquery::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
