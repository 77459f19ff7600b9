//! Tether CLI - inspect and drive the offline time-limit engine from a terminal.

mod cli;
mod commands;
mod error;
mod host;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::login::run_login;
use crate::commands::queue::run_queue;
use crate::commands::session::{run_check, run_connectivity};
use crate::commands::status::run_status;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "tether=info"
        .parse()
        .map_err(|error| CliError::Config(format!("Invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let db_path = resolve_db_path(cli.db_path)?;

    match cli.command {
        Commands::Status { json } => run_status(json, &db_path).await?,
        Commands::Offline => run_connectivity(false, &db_path).await?,
        Commands::Online => run_connectivity(true, &db_path).await?,
        Commands::Check => run_check(&db_path).await?,
        Commands::Login { token } => run_login(token, &db_path).await?,
        Commands::Queue { command } => run_queue(command, &db_path).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
