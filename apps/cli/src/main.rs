//! docforge CLI: template-driven document assembly.
//!
//! Reads a DOCX template, fills its sections from drafts or a generation
//! service, and writes the finished document back out as DOCX.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}