//! ACM switchover CLI
//!
//! Runs repeated switchover cycles between two ACM hubs and reports timing.

use std::process::ExitCode;

use clap::Parser;

use switchover_cli::{exit_code, Cli, EXIT_SETUP_FAILED};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.run().await {
        Ok(result) => exit_code(&result),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(EXIT_SETUP_FAILED)
        }
    }
}
