//! CourseGraph CLI: local course document ingestion.
//!
//! Turns uploaded course documents into a hierarchy of knowledge units and a
//! keyword-overlap graph stored in an embedded database.

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
