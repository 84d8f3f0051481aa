//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Stagehand -- staged, resumable infrastructure integration tests.
///
/// Use `stagehand <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "stagehand", version, about, long_about = None)]
pub struct Cli {
    /// Path to the stagehand.toml configuration file.
    #[arg(short, long, global = true, default_value = "stagehand.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the test suite.
    Run(RunArgs),

    /// List stages and whether each is currently skipped.
    Stages,

    /// Inspect or delete persisted stage state.
    State(StateArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Run every configured test case (or a subset) through all stages.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Run only this test case (repeatable).
    #[arg(long = "case", value_name = "NAME")]
    pub cases: Vec<String>,

    /// Skip this stage in addition to config and SKIP_* variables (repeatable).
    #[arg(long = "skip", value_name = "STAGE")]
    pub skip: Vec<String>,

    /// Override the base directory holding per-case working directories.
    #[arg(long)]
    pub stages_dir: Option<PathBuf>,
}

// ---- state ----

/// Inspect or delete persisted stage state.
#[derive(Args, Debug)]
pub struct StateArgs {
    #[command(subcommand)]
    pub action: StateAction,
}

#[derive(Subcommand, Debug)]
pub enum StateAction {
    /// List configured test cases and whether they have persisted state.
    List,
    /// Show every persisted value of a test case.
    Show {
        /// Test case name.
        case: String,
    },
    /// Delete the persisted values of a test case.
    Clean {
        /// Test case name.
        case: String,
    },
}

// ---- config ----

/// Manage stagehand configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, suite, gcp, terraform, kubectl).
        #[arg(long)]
        section: Option<String>,
    },
}
