//! Structured event definitions for logging.
//!
//! Events follow a consistent schema for machine-parseable JSONL output.
//! All events carry the run id, the iteration when there is one, and the
//! pipeline stage.

use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of one abstraction iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup, configuration and partitioning.
    Init,
    /// Noise sampling and clustering.
    Sample,
    /// Transition interval computation.
    Intervals,
    /// iMDP construction and serialization.
    Build,
    /// External model checker.
    Solve,
    /// Monte Carlo validation.
    Validate,
    /// Reports and summaries.
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Sample => "sample",
            Stage::Intervals => "intervals",
            Stage::Build => "build",
            Stage::Solve => "solve",
            Stage::Validate => "validate",
            Stage::Report => "report",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";
    pub const ITERATION_STARTED: &str = "iteration.started";
    pub const ITERATION_FINISHED: &str = "iteration.finished";
    pub const ITERATION_FAILED: &str = "iteration.failed";

    // Sample stage
    pub const SAMPLE_DRAWN: &str = "sample.drawn";
    pub const SAMPLE_CLUSTERED: &str = "sample.clustered";
    pub const SAMPLE_REUSED: &str = "sample.reused";

    // Intervals stage
    pub const INTERVALS_STARTED: &str = "intervals.started";
    pub const INTERVALS_NONFINITE: &str = "intervals.nonfinite";
    pub const INTERVALS_FINISHED: &str = "intervals.finished";

    // Build stage
    pub const IMDP_BUILT: &str = "imdp.built";
    pub const IMDP_WRITTEN: &str = "imdp.written";

    // Solve stage
    pub const SOLVER_STARTED: &str = "solver.started";
    pub const SOLVER_FINISHED: &str = "solver.finished";

    // Validate stage
    pub const VALIDATE_STARTED: &str = "validate.started";
    pub const VALIDATE_FINISHED: &str = "validate.finished";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const BOUNDS_TABLE_LOADED: &str = "bounds.table_loaded";
}

/// Correlation context for one run (and optionally one iteration).
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub iteration: Option<u32>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            iteration: None,
        }
    }

    /// Context for one iteration of the same run.
    pub fn for_iteration(&self, iteration: u32) -> Self {
        LogContext {
            run_id: self.run_id.clone(),
            iteration: Some(iteration),
        }
    }

    /// Span carrying this context; events inside it inherit run id and
    /// iteration in JSONL output.
    pub fn span(&self, stage: Stage) -> tracing::Span {
        match self.iteration {
            Some(iteration) => tracing::info_span!(
                "scab",
                run_id = %self.run_id,
                iteration = iteration,
                stage = %stage
            ),
            None => tracing::info_span!("scab", run_id = %self.run_id, stage = %stage),
        }
    }
}
