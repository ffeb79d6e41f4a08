// ABOUTME: Entry point for the outrider CLI application.
// ABOUTME: Parses arguments, installs logging and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{CacheAction, Cli, Commands, ResumeAction};
use outrider::error::Result;
use outrider::output::{Output, OutputMode};
use outrider::store::StateDir;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over the flags
    let default_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.debug)
        .with_writer(std::io::stderr)
        .init();

    let mode = OutputMode::from_flags(cli.quiet, cli.json);
    match run(cli, mode).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            Output::new(mode).error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<bool> {
    let state = cli
        .state_dir
        .map(StateDir::new)
        .unwrap_or_else(StateDir::default_location);
    let output = Output::new(mode);

    match cli.command {
        Commands::Deploy(args) => commands::deploy(args, &state, output).await,
        Commands::Validate { config } => commands::validate(&config, &output),
        Commands::Cache { action } => match action {
            CacheAction::Stats => commands::cache_stats(&state, &output),
            CacheAction::Clear { file } => commands::cache_clear(&state, file.as_deref(), &output),
        },
        Commands::Resume { action } => match action {
            ResumeAction::Stats => commands::resume_stats(&state, &output),
            ResumeAction::Cleanup { max_age } => {
                commands::resume_cleanup(&state, max_age, &output)
            }
        },
        Commands::Load { archive, socket } => commands::load(&archive, socket, output).await,
    }
}
