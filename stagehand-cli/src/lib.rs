//! Stagehand CLI library: argument parsing, command handlers, and output rendering.
//!
//! The `stagehand` binary is a thin wrapper over [`run`]; integration tests
//! call the handlers directly.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;

use stagehand_core::StagehandConfig;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Load config, initialize logging, and dispatch the parsed command.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);

    let config = match &cli.command {
        // `config validate` reports a broken file itself
        Commands::Config(_) => StagehandConfig::default(),
        _ => StagehandConfig::load_or_default(&cli.config).await?,
    };
    init_logging(&config, cli.log_level.as_deref())?;
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, config, &writer).await,
        Commands::Stages => commands::stages::execute(&config, &writer),
        Commands::State(args) => commands::state::execute(args, &config, &writer),
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}

fn init_logging(config: &StagehandConfig, level: Option<&str>) -> Result<(), CliError> {
    let mut general = config.general.clone();
    if let Some(level) = level {
        general.log_level = level.to_owned();
    }
    logging::init_tracing(&general).map_err(|e| CliError::Config(e.to_string()))
}
