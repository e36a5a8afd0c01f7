//! valuerank CLI: screens a market segment by composite value rank.
//!
//! Crawls every listing page of the chosen segment, ranks the securities and
//! writes the result to disk.

mod commands;

use anyhow::Result;
use clap::Parser;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
