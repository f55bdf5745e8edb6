//! Abstraction settings.
//!
//! Everything that controls *how* a model is abstracted, as opposed to the
//! model itself: sample budget, confidence, modes, rounding, the optional
//! model checker and Monte Carlo validation, and where outputs go.
//!
//! Every section has a full set of defaults, so an empty settings file (or
//! no file at all) is valid.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

/// Complete settings for one abstraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AbstractionSettings {
    pub schema_version: String,

    pub sampling: SamplingSettings,

    /// Interval MDP or point-estimate MDP.
    pub mdp_mode: MdpMode,

    /// Aleatoric noise only, or noise plus parametric uncertainty.
    pub abstraction_type: AbstractionType,

    /// Number of independent abstraction iterations.
    pub iterations: u32,

    pub rounding: RoundingSettings,

    pub monte_carlo: MonteCarloSettings,

    /// External model checker; absent means the iMDP is only written.
    pub solver: Option<SolverSettings>,

    pub output: OutputSettings,

    /// Precomputed bound table (file or directory); bounds are computed
    /// directly on a miss.
    pub bound_table: Option<PathBuf>,
}

impl Default for AbstractionSettings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            sampling: SamplingSettings::default(),
            mdp_mode: MdpMode::default(),
            abstraction_type: AbstractionType::default(),
            iterations: 1,
            rounding: RoundingSettings::default(),
            monte_carlo: MonteCarloSettings::default(),
            solver: None,
            output: OutputSettings::default(),
            bound_table: None,
        }
    }
}

/// Noise sampling and the scenario confidence level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SamplingSettings {
    /// Noise samples N per iteration.
    pub samples: u64,

    /// Confidence parameter β; each interval holds with probability at
    /// least 1 − β/N.
    pub confidence: f64,

    /// Euclidean radius for merging near-identical samples (0 disables).
    pub cluster_radius: f64,

    /// Base seed; fresh entropy when absent.
    pub seed: Option<u64>,

    /// Reuse the first iteration's noise pool in later iterations.
    pub reuse_pool: bool,

    /// How a region is pushed through the dynamics.
    pub representative: Representative,

    /// Largest tolerated share of non-finite successor samples per pair.
    pub max_nonfinite_fraction: f64,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            samples: 3200,
            confidence: 1e-8,
            cluster_radius: 0.0,
            seed: None,
            reuse_pool: false,
            representative: Representative::default(),
            max_nonfinite_fraction: 0.01,
        }
    }
}

/// Image of a region under the dynamics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Representative {
    /// Axis-aligned hull of the whole region's image.
    #[default]
    Hull,
    /// Image of the region centre only.
    Center,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MdpMode {
    #[default]
    Interval,
    Estimate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AbstractionType {
    #[default]
    Stochastic,
    Epistemic,
}

/// Outward rounding of interval endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RoundingSettings {
    /// Decimal places kept (low rounded down, high rounded up).
    pub decimals: u32,

    /// Floor applied to lower bounds of observed successors.
    pub min_probability: f64,
}

impl Default for RoundingSettings {
    fn default() -> Self {
        Self {
            decimals: 5,
            min_probability: 0.0,
        }
    }
}

/// Empirical validation of a synthesized policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MonteCarloSettings {
    pub enabled: bool,

    /// Simulated trajectories.
    pub trials: u64,

    /// Coverage of the reported Clopper–Pearson interval.
    pub confidence: f64,

    /// Trajectory length when the property horizon is unbounded.
    pub max_steps: u32,

    /// Overrides the model's initial state.
    pub initial_state: Option<Vec<f64>>,

    pub seed: Option<u64>,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            trials: 1000,
            confidence: 0.95,
            max_steps: 100,
            initial_state: None,
            seed: None,
        }
    }
}

/// External model checker invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SolverSettings {
    /// Checker executable (looked up on PATH when relative).
    pub prism_path: PathBuf,

    /// Java heap for the checker, in GiB.
    pub java_memory_gb: u32,

    pub timeout_secs: u64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            prism_path: PathBuf::from("prism"),
            java_memory_gb: 8,
            timeout_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory under which each run gets its own folder.
    pub root: PathBuf,

    /// File stem of the exchange artifacts.
    pub prefix: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("output"),
            prefix: "model".to_string(),
        }
    }
}
