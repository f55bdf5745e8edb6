//! Error types for the scenario abstraction engine.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Insufficient Samples
//!   Reason: 20 samples cannot certify any bound at confidence 1e-8 (need at least 33)
//!   Fix: Increase sampling.samples or relax sampling.confidence.
//! ```
//!
//! # Agent-Facing Output
//!
//! ```json
//! {
//!   "code": 20,
//!   "category": "statistics",
//!   "message": "20 samples cannot certify any bound at confidence 1e-8 (need at least 33)",
//!   "recoverable": true,
//!   "suggested_action": "adjust_config",
//!   "context": { "samples": 20, "required": 33 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for abstraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Model definition, settings and partition errors.
    Config,
    /// Sample budget and numerical propagation errors.
    Statistics,
    /// Exchange-format and result-file errors.
    Artifact,
    /// External model checker errors.
    Solver,
    /// File I/O and JSON errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Statistics => write!(f, "statistics"),
            ErrorCategory::Artifact => write!(f, "artifact"),
            ErrorCategory::Solver => write!(f, "solver"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions for automation reacting to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Fix the model or settings file.
    AdjustConfig,
    /// Run the `check` command for a detailed report.
    RunCheck,
    /// Retry the iteration (fresh noise may succeed).
    Retry,
    /// Inspect the retained iteration outputs.
    InspectOutputs,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::AdjustConfig => write!(f, "adjust_config"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::InspectOutputs => write!(f, "inspect_outputs"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for the abstraction engine.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid model definition: {0}")]
    InvalidModel(String),

    #[error("invalid partition: {0}")]
    InvalidPartition(String),

    // Statistical errors (20-29)
    #[error("{samples} samples cannot certify any bound at confidence {confidence:e} (need at least {required})")]
    InsufficientSamples {
        samples: u64,
        required: u64,
        confidence: f64,
    },

    #[error("{excluded} of {total} propagated samples were non-finite for region {region}, action {action}")]
    NumericalFailure {
        region: u32,
        action: u32,
        excluded: u64,
        total: u64,
    },

    // Artifact errors (30-39)
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("malformed result file {path}: {reason}")]
    MalformedResult { path: String, reason: String },

    // Solver errors (40-49)
    #[error("model checker failed: {0}")]
    SolverFailed(String),

    #[error("model checker timed out after {seconds}s")]
    SolverTimeout { seconds: u64 },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Statistical errors
    /// - 30-39: Artifact errors
    /// - 40-49: Solver errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidModel(_) => 11,
            Error::InvalidPartition(_) => 12,
            Error::InsufficientSamples { .. } => 20,
            Error::NumericalFailure { .. } => 21,
            Error::Serialization(_) => 30,
            Error::MalformedResult { .. } => 31,
            Error::SolverFailed(_) => 40,
            Error::SolverTimeout { .. } => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidModel(_) | Error::InvalidPartition(_) => {
                ErrorCategory::Config
            }
            Error::InsufficientSamples { .. } | Error::NumericalFailure { .. } => {
                ErrorCategory::Statistics
            }
            Error::Serialization(_) | Error::MalformedResult { .. } => ErrorCategory::Artifact,
            Error::SolverFailed(_) | Error::SolverTimeout { .. } => ErrorCategory::Solver,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether a later iteration (or a fixed input) may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidModel(_) | Error::InvalidPartition(_) => true,
            Error::InsufficientSamples { .. } => true,
            // a different noise draw may stay finite
            Error::NumericalFailure { .. } => true,
            // the builder produced an invalid interval: a bug, not an input problem
            Error::Serialization(_) => false,
            Error::MalformedResult { .. } => false,
            Error::SolverFailed(_) => true,
            Error::SolverTimeout { .. } => true,
            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Returns the suggested action for automation.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) => SuggestedAction::RunCheck,
            Error::InvalidModel(_) | Error::InvalidPartition(_) => SuggestedAction::AdjustConfig,
            Error::InsufficientSamples { .. } => SuggestedAction::AdjustConfig,
            Error::NumericalFailure { .. } => SuggestedAction::Retry,
            Error::Serialization(_) => SuggestedAction::ManualIntervention,
            Error::MalformedResult { .. } => SuggestedAction::InspectOutputs,
            Error::SolverFailed(_) => SuggestedAction::InspectOutputs,
            Error::SolverTimeout { .. } => SuggestedAction::AdjustConfig,
            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Run 'scab check <model>' to validate the model and settings files.",
            Error::InvalidModel(_) => {
                "Check matrix shapes against the state and input dimensions, and that the noise covariance is positive definite."
            }
            Error::InvalidPartition(_) => {
                "Regions must lie inside the domain, must not overlap, and must cover it without gaps."
            }
            Error::InsufficientSamples { .. } => {
                "Increase sampling.samples or relax sampling.confidence."
            }
            Error::NumericalFailure { .. } => {
                "Check the dynamics for overflow (very large matrix entries or noise) or raise sampling.max_nonfinite_fraction."
            }
            Error::Serialization(_) => {
                "An interval outside [0, 1] reached the writer. Report with the iteration's report.json."
            }
            Error::MalformedResult { .. } => {
                "The model checker wrote an unexpected result file. Inspect the retained iteration folder."
            }
            Error::SolverFailed(_) => {
                "Inspect solver.stdout and solver.stderr in the iteration folder, and check solver.prism_path."
            }
            Error::SolverTimeout { .. } => "Raise solver.timeout_secs or reduce the partition size.",
            Error::Io(_) => "Check disk space and permissions on the output root.",
            Error::Json(_) => "Invalid JSON. Check the file syntax or regenerate it.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidModel(_) => "Invalid Model Definition",
            Error::InvalidPartition(_) => "Invalid Partition",
            Error::InsufficientSamples { .. } => "Insufficient Samples",
            Error::NumericalFailure { .. } => "Numerical Failure",
            Error::Serialization(_) => "Serialization Error",
            Error::MalformedResult { .. } => "Malformed Solver Result",
            Error::SolverFailed(_) => "Model Checker Failed",
            Error::SolverTimeout { .. } => "Model Checker Timeout",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for automation.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (region, action, counts).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::InsufficientSamples {
                samples,
                required,
                confidence,
            } => {
                context.insert("samples".to_string(), serde_json::json!(samples));
                context.insert("required".to_string(), serde_json::json!(required));
                context.insert("confidence".to_string(), serde_json::json!(confidence));
            }
            Error::NumericalFailure {
                region,
                action,
                excluded,
                total,
            } => {
                context.insert("region".to_string(), serde_json::json!(region));
                context.insert("action".to_string(), serde_json::json!(action));
                context.insert("excluded".to_string(), serde_json::json!(excluded));
                context.insert("total".to_string(), serde_json::json!(total));
            }
            Error::MalformedResult { path, .. } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            Error::SolverTimeout { seconds } => {
                context.insert("timeout_seconds".to_string(), serde_json::json!(seconds));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Result of a batch of independent items (iterations) that may partly fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult<T> {
    /// Successfully completed items.
    pub succeeded: Vec<T>,

    /// Failed items with their errors.
    pub failed: Vec<BatchError>,

    /// Summary statistics.
    pub summary: BatchSummary,
}

/// A single error in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Index or identifier of the failed item.
    pub item_id: String,

    /// The structured error.
    pub error: StructuredError,
}

/// Summary of batch results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub all_succeeded: bool,
    pub any_succeeded: bool,
}

impl<T> BatchResult<T> {
    /// Add a failure to the batch result.
    pub fn add_failure(&mut self, item_id: impl Into<String>, error: &Error) {
        self.failed.push(BatchError {
            item_id: item_id.into(),
            error: StructuredError::from(error),
        });
        self.summary.failed += 1;
        self.summary.total += 1;
        self.summary.all_succeeded = false;
    }

    /// Add a success to the batch result.
    pub fn add_success(&mut self, item: T) {
        self.succeeded.push(item);
        self.summary.succeeded += 1;
        self.summary.total += 1;
        self.summary.any_succeeded = true;
    }
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        BatchResult {
            succeeded: Vec::new(),
            failed: Vec::new(),
            summary: BatchSummary {
                total: 0,
                succeeded: 0,
                failed: 0,
                all_succeeded: true,
                any_succeeded: false,
            },
        }
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insufficient() -> Error {
        Error::InsufficientSamples {
            samples: 20,
            required: 33,
            confidence: 1e-8,
        }
    }

    #[test]
    fn test_error_code() {
        assert_eq!(Error::Config("x".into()).code(), 10);
        assert_eq!(Error::InvalidPartition("x".into()).code(), 12);
        assert_eq!(insufficient().code(), 20);
        assert_eq!(Error::SolverTimeout { seconds: 5 }.code(), 41);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(Error::InvalidModel("x".into()).category(), ErrorCategory::Config);
        assert_eq!(insufficient().category(), ErrorCategory::Statistics);
        assert_eq!(Error::Serialization("x".into()).category(), ErrorCategory::Artifact);
        assert_eq!(Error::SolverFailed("x".into()).category(), ErrorCategory::Solver);
    }

    #[test]
    fn test_error_recoverable() {
        assert!(insufficient().is_recoverable());
        assert!(!Error::Serialization("x".into()).is_recoverable());
    }

    #[test]
    fn test_insufficient_samples_message() {
        let msg = insufficient().to_string();
        assert!(msg.contains("20 samples"));
        assert!(msg.contains("1e-8"));
        assert!(msg.contains("33"));
    }

    #[test]
    fn test_structured_error_context() {
        let err = Error::NumericalFailure {
            region: 3,
            action: 1,
            excluded: 40,
            total: 100,
        };
        let structured = StructuredError::from(&err);
        assert_eq!(structured.code, 21);
        assert_eq!(structured.suggested_action, SuggestedAction::Retry);
        assert_eq!(structured.context.get("region"), Some(&serde_json::json!(3)));

        let json = structured.to_json();
        assert!(json.contains(r#""category":"statistics""#));
    }

    #[test]
    fn test_batch_result() {
        let mut batch: BatchResult<u32> = BatchResult::default();
        assert!(batch.summary.all_succeeded);

        batch.add_success(0);
        batch.add_failure("iteration-1", &Error::SolverFailed("exit code 1".into()));

        assert_eq!(batch.summary.total, 2);
        assert_eq!(batch.summary.failed, 1);
        assert!(!batch.summary.all_succeeded);
        assert!(batch.summary.any_succeeded);
        assert_eq!(batch.failed[0].item_id, "iteration-1");
    }

    #[test]
    fn test_format_error_human() {
        let formatted = crate::format_error_human(&insufficient(), false);
        assert!(formatted.contains("Insufficient Samples"));
        assert!(formatted.contains("sampling.samples"));
    }
}
