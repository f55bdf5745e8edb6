//! Transition probability intervals from propagated noise samples.
//!
//! For every (region, action) pair the noise clusters are pushed through the
//! dynamics, the resulting successor boxes are counted per region, and the
//! counts are turned into scenario-bound confidence intervals.

pub mod bounds;
pub mod calculator;

pub use bounds::{BoundLookup, LayeredBounds, ScenarioBounds, TabulatedBounds};
pub use calculator::{check_sample_budget, CalculatorConfig, IntervalCalculator};

use serde::{Deserialize, Serialize};

use crate::dynamics::ActionId;
use crate::partition::RegionId;

/// Inclusive probability bound `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityInterval {
    pub low: f64,
    pub high: f64,
}

impl ProbabilityInterval {
    pub const CERTAIN: ProbabilityInterval = ProbabilityInterval {
        low: 1.0,
        high: 1.0,
    };

    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn point(p: f64) -> Self {
        Self { low: p, high: p }
    }

    /// `0 ≤ low ≤ high ≤ 1`, both finite.
    pub fn is_valid(&self) -> bool {
        self.low.is_finite()
            && self.high.is_finite()
            && 0.0 <= self.low
            && self.low <= self.high
            && self.high <= 1.0
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    /// Round to `decimals` places away from the interval's centre, so the
    /// rounded interval contains the original.
    pub fn round_outward(self, decimals: u32) -> Self {
        let scale = 10f64.powi(decimals as i32);
        Self {
            low: ((self.low * scale).floor() / scale).clamp(0.0, 1.0),
            high: ((self.high * scale).ceil() / scale).clamp(0.0, 1.0),
        }
    }
}

/// Successor of a transition: the outside state or a region.
///
/// Ordered with `Outside` first, then regions by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Successor {
    Outside,
    Region(RegionId),
}

impl Successor {
    /// iMDP state index: 0 for outside, `1 + id` for regions.
    pub fn state(self) -> u32 {
        match self {
            Successor::Outside => 0,
            Successor::Region(id) => id + 1,
        }
    }

    pub fn from_state(state: u32) -> Self {
        match state {
            0 => Successor::Outside,
            s => Successor::Region(s - 1),
        }
    }
}

/// One (source, action, target) bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionInterval {
    pub source: RegionId,
    pub action: ActionId,
    pub target: Successor,
    pub interval: ProbabilityInterval,
}

/// Weighted sample counts for one successor: samples certainly inside
/// (`low`) and possibly inside (`high`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessorCounts {
    pub low: u64,
    pub high: u64,
}

/// Interval distribution of one (region, action) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateActionDistribution {
    pub source: RegionId,
    pub action: ActionId,
    /// Ascending successor order, outside always present.
    pub successors: Vec<(Successor, ProbabilityInterval)>,
    /// Mass the region successors leave unassigned, before rounding. It is
    /// already merged into the outside interval.
    pub residual: ProbabilityInterval,
    pub counts: Vec<(Successor, SuccessorCounts)>,
    pub samples: u64,
    /// Non-finite samples left out of the counts.
    pub excluded: u64,
}

impl StateActionDistribution {
    pub fn transitions(&self) -> impl Iterator<Item = TransitionInterval> + '_ {
        self.successors
            .iter()
            .map(move |(target, interval)| TransitionInterval {
                source: self.source,
                action: self.action,
                target: *target,
                interval: *interval,
            })
    }

    pub fn interval(&self, target: Successor) -> Option<ProbabilityInterval> {
        self.successors
            .iter()
            .find(|(s, _)| *s == target)
            .map(|(_, i)| *i)
    }

    pub fn low_sum(&self) -> f64 {
        self.successors.iter().map(|(_, i)| i.low).sum()
    }

    pub fn high_sum(&self) -> f64 {
        self.successors.iter().map(|(_, i)| i.high).sum()
    }
}
