//! Scenario abstraction shared types, identifiers and errors.
//!
//! This crate provides the foundational types shared by the other crates:
//! - The unified error taxonomy with stable codes
//! - Run and iteration identifiers used for output locations
//! - Output format selection for CLI payloads

pub mod error;
pub mod id;
pub mod output;

pub use error::{
    format_error_human, BatchResult, Error, ErrorCategory, Result, StructuredError,
    SuggestedAction,
};
pub use id::{IterationId, RunId};
pub use output::OutputFormat;
