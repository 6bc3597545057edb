//! Exit codes and structured error reports.

use serde::Serialize;

use crate::config::ConfigError;
use crate::signal::EXIT_CODE_INTERRUPTED;

/// Process exit codes.
///
/// - 0: Success
/// - 1: General error (unexpected failure)
/// - 2: Configuration error (bad file, bad value)
/// - 3: Partial success (some downloads or removals failed)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    ConfigError = 2,
    PartialSuccess = 3,
    Interrupted = EXIT_CODE_INTERRUPTED as isize,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "MV000",
            Self::GeneralError => "MV001",
            Self::ConfigError => "MV002",
            Self::PartialSuccess => "MV003",
            Self::Interrupted => "MV130",
        }
    }

    /// Exit code for an error that escaped `run_app`.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        if err.chain().any(|cause| cause.is::<ConfigError>()) {
            Self::ConfigError
        } else {
            Self::GeneralError
        }
    }
}

/// Error report printed with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// e.g. "MV002"
    pub code: String,
    pub exit_code: i32,
    pub message: String,
    /// Underlying causes, outermost first.
    pub causes: Vec<String>,
    pub interrupted: bool,
}

impl StructuredError {
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
