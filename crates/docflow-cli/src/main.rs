//! `docflow`: operational CLI for the document-processing pipeline.

mod cli;
mod commands;
mod context;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Process(args) => commands::handle_process(args).await,
        Commands::Queue(args) => commands::handle_queue(args).await,
        Commands::Status => commands::handle_status().await,
        Commands::Test => commands::handle_test().await,
        Commands::Cleanup(args) => commands::handle_cleanup(args).await,
    }
}
