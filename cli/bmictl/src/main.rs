//! bmictl (bmi) - CLI for the BMI disk image orchestrator
//!
//! Every subcommand maps to one einstein command sent to `POST /v1/execute`.

use anyhow::Result;
use clap::Parser;

mod client;
mod commands;
mod error;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
