//! Exit codes for the scab CLI.
//!
//! Exit codes communicate the run outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-1: Operational outcomes
//! - 10-19: User/input errors (recoverable by fixing the model, settings or environment)
//! - 20-29: Internal errors (bugs, should be reported)

use scab_common::{Error, ErrorCategory};

/// Exit codes for scab operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-1)
    // ========================================================================
    /// Every iteration completed
    Clean = 0,

    /// Some iterations failed, at least one completed
    PartialFail = 1,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments, model or settings
    ArgsError = 10,

    /// Sample budget too small for the requested confidence
    SamplesError = 11,

    /// Model checker missing, failing or timing out
    SolverError = 12,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,

    /// Numerical failure while propagating samples
    NumericalError = 22,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Check if this exit code is a user/environment error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        let code = self as i32;
        (10..20).contains(&code)
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::PartialFail => "ERR_PARTIAL",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::SamplesError => "ERR_SAMPLES",
            ExitCode::SolverError => "ERR_SOLVER",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
            ExitCode::NumericalError => "ERR_NUMERICAL",
        }
    }

    /// Map an engine error onto its exit code.
    pub fn for_error(err: &Error) -> Self {
        match err {
            Error::InsufficientSamples { .. } => ExitCode::SamplesError,
            Error::NumericalFailure { .. } => ExitCode::NumericalError,
            _ => match err.category() {
                ErrorCategory::Config => ExitCode::ArgsError,
                ErrorCategory::Statistics => ExitCode::SamplesError,
                ErrorCategory::Solver => ExitCode::SolverError,
                ErrorCategory::Artifact => ExitCode::InternalError,
                ErrorCategory::Io => ExitCode::IoError,
            },
        }
    }

    /// Map a stable error code (as recorded in run summaries).
    pub fn for_code(code: u32) -> Self {
        match code {
            20 => ExitCode::SamplesError,
            21 => ExitCode::NumericalError,
            10..=19 => ExitCode::ArgsError,
            22..=29 => ExitCode::SamplesError,
            40..=49 => ExitCode::SolverError,
            60..=69 => ExitCode::IoError,
            _ => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
