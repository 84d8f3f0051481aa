//! CLI-specific error types and exit code mapping

use stagehand_adapters::AdapterError;
use stagehand_core::{StagehandError, StoreError};

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed (bad argument, unknown case, ...).
    #[error("{0}")]
    Command(String),

    /// The suite ran but at least one test case failed.
    #[error("{failed} of {total} test case(s) failed")]
    TestsFailed { failed: usize, total: usize },

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from stagehand-core.
    #[error("{0}")]
    Core(#[from] StagehandError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                         |
    /// |------|---------------------------------|
    /// | 0    | Success                         |
    /// | 1    | General / command error         |
    /// | 2    | Configuration error             |
    /// | 5    | One or more test cases failed   |
    /// | 10   | IO error                        |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(StagehandError::Config(_)) => 2,
            Self::TestsFailed { .. } => 5,
            Self::Io(_) | Self::Core(StagehandError::Io(_)) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::Core(e.into())
    }
}

impl From<AdapterError> for CliError {
    fn from(e: AdapterError) -> Self {
        Self::Core(e.into())
    }
}
