//! DeepResearch CLI: ask a question, get a researched answer.
//!
//! Searches the web, summarizes each source, drafts an answer and refines
//! it, printing the final answer followed by the sources it drew on.

mod commands;
mod render;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
