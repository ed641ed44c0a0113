//! Binary crate for the `wxhist` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Resolving API keys for the current run
//! - Human-friendly output formatting

use clap::Parser;

mod cli;
mod logging;
mod output;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    cmd.run().await
}
