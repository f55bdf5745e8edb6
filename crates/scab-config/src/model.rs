//! Model definition types.
//!
//! A model file describes the discrete-time linear system
//! `x⁺ = A x + B u + q + w`, the noise `w`, the bounded domain and its
//! partition, the action set and the reach-avoid property.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

/// Complete model definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelDefinition {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub dynamics: DynamicsSpec,

    pub noise: NoiseSpec,

    pub partition: PartitionSpec,

    pub actions: ActionSpec,

    /// Boxes whose covered regions are targets.
    #[serde(default)]
    pub goal: Vec<RegionBox>,

    /// Boxes whose touched regions are unsafe.
    #[serde(default)]
    pub critical: Vec<RegionBox>,

    pub timebound: TimeBound,

    /// Parametric uncertainty on the dynamics; used when the abstraction
    /// type is epistemic.
    #[serde(default)]
    pub epistemic: Option<EpistemicSpec>,

    /// Continuous initial state for Monte Carlo validation.
    #[serde(default)]
    pub initial_state: Option<Vec<f64>>,
}

impl ModelDefinition {
    /// State dimension (rows of A).
    pub fn state_dim(&self) -> usize {
        self.dynamics.a.len()
    }

    /// Control dimension (columns of B).
    pub fn input_dim(&self) -> usize {
        self.dynamics.b.first().map_or(0, Vec::len)
    }
}

/// Linear dynamics matrices, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DynamicsSpec {
    /// State transition matrix (n × n).
    pub a: Vec<Vec<f64>>,

    /// Control matrix (n × p).
    pub b: Vec<Vec<f64>>,

    /// Constant drift (n); zero when absent.
    #[serde(default)]
    pub q: Option<Vec<f64>>,
}

/// Process-noise distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoiseSpec {
    /// Multivariate Gaussian.
    Gaussian {
        /// Covariance matrix (n × n), symmetric positive definite.
        covariance: Vec<Vec<f64>>,
        /// Mean (n); zero when absent.
        #[serde(default)]
        mean: Option<Vec<f64>>,
    },
    /// Empirical pool resampled with replacement.
    Empirical {
        /// Name of the source, for reports.
        #[serde(default)]
        source: Option<String>,
        /// Inline pool of noise vectors.
        #[serde(default)]
        samples: Vec<Vec<f64>>,
        /// File with one vector per line (comma or whitespace separated),
        /// relative to the model file.
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

impl NoiseSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            NoiseSpec::Gaussian { .. } => "gaussian",
            NoiseSpec::Empirical { .. } => "empirical",
        }
    }
}

/// Bounded domain and its partition.
///
/// Either `number` (uniform grid) or `regions` (explicit boxes) is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PartitionSpec {
    /// `[lower, upper]` per state dimension.
    pub domain: Vec<[f64; 2]>,

    /// Grid cells per dimension.
    #[serde(default)]
    pub number: Option<Vec<usize>>,

    /// Explicit, irregular regions; each axis a `[lower, upper]` pair.
    #[serde(default)]
    pub regions: Vec<Vec<[f64; 2]>>,
}

/// Finite action set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpec {
    /// Evenly spaced inputs per control dimension (endpoints included).
    Grid {
        lower: Vec<f64>,
        upper: Vec<f64>,
        number: Vec<usize>,
    },
    /// Explicit list of control inputs.
    List { inputs: Vec<Vec<f64>> },
}

/// Axis-aligned box used for goal and critical sets.
pub type RegionBox = Vec<AxisRange>;

/// One axis of a goal or critical box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AxisRange {
    /// Closed interval `[lower, upper]`.
    Bounds([f64; 2]),
    /// The keyword `"all"`: the whole domain extent on this axis.
    All(AllKeyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AllKeyword {
    All,
}

impl AxisRange {
    /// Resolve against the domain extent of the same axis.
    pub fn resolve(&self, domain: [f64; 2]) -> [f64; 2] {
        match self {
            AxisRange::Bounds(bounds) => *bounds,
            AxisRange::All(_) => domain,
        }
    }
}

/// Horizon of the reach-avoid property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TimeBound {
    /// Number of steps.
    Steps(u32),
    /// The keyword `"unbounded"`.
    Unbounded(UnboundedKeyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum UnboundedKeyword {
    Unbounded,
}

impl TimeBound {
    pub fn steps(&self) -> Option<u32> {
        match self {
            TimeBound::Steps(n) => Some(*n),
            TimeBound::Unbounded(_) => None,
        }
    }
}

/// Bounded parametric uncertainty: `A ∈ A₀ ± ΔA`, `B ∈ B₀ ± ΔB`, plus an
/// additive disturbance box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EpistemicSpec {
    /// Element-wise bound on |A − A₀| (n × n).
    pub a_deviation: Vec<Vec<f64>>,

    /// Element-wise bound on |B − B₀| (n × p).
    #[serde(default)]
    pub b_deviation: Option<Vec<Vec<f64>>>,

    #[serde(default)]
    pub disturbance: Option<DisturbanceSpec>,
}

/// Additive bounded disturbance `d ∈ [lower, upper]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DisturbanceSpec {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}
