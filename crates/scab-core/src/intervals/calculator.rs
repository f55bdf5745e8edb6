//! Per (region, action) counting and interval construction.

use std::collections::BTreeMap;

use rayon::prelude::*;
use scab_common::{Error, Result};
use scab_config::{AbstractionSettings, MdpMode, Representative};
use scab_math::scenario;
use tracing::warn;

use super::{
    BoundLookup, ProbabilityInterval, StateActionDistribution, Successor, SuccessorCounts,
};
use crate::dynamics::{Action, ActionId, EpistemicBounds, LinearDynamics};
use crate::logging::event_names;
use crate::noise::SampleCluster;
use crate::partition::{Coverage, Partition, Region, RegionId};

/// Calculator parameters taken from the abstraction settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorConfig {
    pub confidence: f64,
    pub mode: MdpMode,
    pub representative: Representative,
    pub decimals: u32,
    pub min_probability: f64,
    pub max_nonfinite_fraction: f64,
}

impl CalculatorConfig {
    pub fn from_settings(settings: &AbstractionSettings) -> Self {
        Self {
            confidence: settings.sampling.confidence,
            mode: settings.mdp_mode,
            representative: settings.sampling.representative,
            decimals: settings.rounding.decimals,
            min_probability: settings.rounding.min_probability,
            max_nonfinite_fraction: settings.sampling.max_nonfinite_fraction,
        }
    }
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self::from_settings(&AbstractionSettings::default())
    }
}

/// Fails with `InsufficientSamples` unless an event seen in every one of
/// `samples` samples gets a lower bound of at least
/// [`scenario::MIN_INFORMATIVE_BOUND`]. Below that even a certain successor
/// cannot be certified as more likely than not, and every region interval
/// degenerates towards `[0, 1]`.
pub fn check_sample_budget(samples: u64, confidence: f64) -> Result<()> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(Error::Config(format!(
            "confidence must lie in (0, 1), got {confidence}"
        )));
    }
    let informative = samples > 0
        && scenario::certain_event_bound(samples, confidence) >= scenario::MIN_INFORMATIVE_BOUND;
    if informative {
        return Ok(());
    }
    Err(Error::InsufficientSamples {
        samples,
        required: scenario::minimum_samples(confidence, scenario::MIN_INFORMATIVE_BOUND)
            .unwrap_or(u64::MAX),
        confidence,
    })
}

pub struct IntervalCalculator<'a> {
    dynamics: &'a LinearDynamics,
    partition: &'a Partition,
    bounds: &'a dyn BoundLookup,
    epistemic: Option<&'a EpistemicBounds>,
    config: CalculatorConfig,
}

impl<'a> IntervalCalculator<'a> {
    pub fn new(
        dynamics: &'a LinearDynamics,
        partition: &'a Partition,
        bounds: &'a dyn BoundLookup,
        config: CalculatorConfig,
    ) -> Self {
        Self {
            dynamics,
            partition,
            bounds,
            epistemic: None,
            config,
        }
    }

    /// Widen every image box by the parametric uncertainty margins.
    pub fn with_epistemic(mut self, epistemic: &'a EpistemicBounds) -> Self {
        self.epistemic = Some(epistemic);
        self
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    /// Distributions for every non-absorbing region and every action,
    /// computed in parallel and keyed in (region, action) order.
    pub fn compute_all(
        &self,
        actions: &[Action],
        clusters: &[SampleCluster],
    ) -> Result<BTreeMap<(RegionId, ActionId), StateActionDistribution>> {
        let samples: u64 = clusters.iter().map(|c| c.weight).sum();
        check_sample_budget(samples, self.config.confidence)?;

        let pairs: Vec<(&Region, &Action)> = self
            .partition
            .regions()
            .iter()
            .filter(|r| !r.is_absorbing())
            .flat_map(|r| actions.iter().map(move |a| (r, a)))
            .collect();

        let computed: Vec<StateActionDistribution> = pairs
            .par_iter()
            .map(|(region, action)| self.distribution(region, action, clusters))
            .collect::<Result<_>>()?;

        Ok(computed
            .into_iter()
            .map(|d| ((d.source, d.action), d))
            .collect())
    }

    /// Interval distribution of one (region, action) pair.
    pub fn distribution(
        &self,
        region: &Region,
        action: &Action,
        clusters: &[SampleCluster],
    ) -> Result<StateActionDistribution> {
        let samples: u64 = clusters.iter().map(|c| c.weight).sum();
        check_sample_budget(samples, self.config.confidence)?;

        let (counts, excluded) = self.count(region, action, clusters)?;
        let (successors, residual) = match self.config.mode {
            MdpMode::Interval => self.interval_successors(&counts, samples)?,
            MdpMode::Estimate => {
                let successors = estimate_successors(&counts, samples);
                let residual = unassigned_mass(&successors);
                (successors, residual)
            }
        };

        Ok(StateActionDistribution {
            source: region.id,
            action: action.id,
            successors,
            residual,
            counts: counts.into_iter().collect(),
            samples,
            excluded,
        })
    }

    fn count(
        &self,
        region: &Region,
        action: &Action,
        clusters: &[SampleCluster],
    ) -> Result<(BTreeMap<Successor, SuccessorCounts>, u64)> {
        let mut image = self
            .dynamics
            .image_box(region, action, self.config.representative);
        if let Some(epistemic) = self.epistemic {
            let margin = epistemic.widening(region, action);
            for d in 0..image.lower.len() {
                image.lower[d] -= margin.below[d];
                image.upper[d] += margin.above[d];
            }
        }

        let mut counts: BTreeMap<Successor, SuccessorCounts> = BTreeMap::new();
        counts.insert(Successor::Outside, SuccessorCounts::default());
        let mut excluded = 0u64;
        let mut lower = vec![0.0; image.lower.len()];
        let mut upper = vec![0.0; image.upper.len()];

        for cluster in clusters {
            let w = cluster.weight;
            for d in 0..lower.len() {
                lower[d] = image.lower[d] + cluster.lower[d];
                upper[d] = image.upper[d] + cluster.upper[d];
            }
            if lower.iter().chain(&upper).any(|v| !v.is_finite()) {
                excluded += w;
                continue;
            }

            let cover = self.partition.cover(&lower, &upper);
            match cover.coverage {
                Coverage::Outside => {
                    let c = counts.entry(Successor::Outside).or_default();
                    c.low += w;
                    c.high += w;
                }
                Coverage::Partial => {
                    counts.entry(Successor::Outside).or_default().high += w;
                    for id in cover.regions {
                        counts.entry(Successor::Region(id)).or_default().high += w;
                    }
                }
                Coverage::Inside => {
                    let single = cover.regions.len() == 1;
                    for id in cover.regions {
                        let c = counts.entry(Successor::Region(id)).or_default();
                        c.high += w;
                        if single {
                            c.low += w;
                        }
                    }
                }
            }
        }

        if excluded > 0 {
            let total: u64 = clusters.iter().map(|c| c.weight).sum();
            let fraction = excluded as f64 / total as f64;
            if fraction > self.config.max_nonfinite_fraction {
                return Err(Error::NumericalFailure {
                    region: region.id,
                    action: action.id,
                    excluded,
                    total,
                });
            }
            warn!(
                target: event_names::INTERVALS_NONFINITE,
                region = region.id,
                action = action.id,
                excluded,
                total,
                "non-finite successors excluded and credited to the outside upper bound"
            );
            counts.entry(Successor::Outside).or_default().high += excluded;
        }

        Ok((counts, excluded))
    }

    /// Scenario intervals for every observed successor and for outside. The
    /// mass the region intervals leave unassigned is merged into the
    /// outside interval before rounding, so the listed highs sum to at
    /// least one and the listed lows to at most one.
    fn interval_successors(
        &self,
        counts: &BTreeMap<Successor, SuccessorCounts>,
        samples: u64,
    ) -> Result<(Vec<(Successor, ProbabilityInterval)>, ProbabilityInterval)> {
        let beta = self.config.confidence;
        let bound = |discarded: u64| {
            self.bounds.lookup(samples, beta, discarded).ok_or_else(|| {
                Error::Config(format!(
                    "no scenario bound for N={samples}, confidence={beta:e}, k={discarded}"
                ))
            })
        };

        let mut out = Vec::with_capacity(counts.len());
        for (successor, c) in counts {
            if c.high == 0 && *successor != Successor::Outside {
                continue;
            }
            let low = bound(samples - c.low.min(samples))?.low;
            let high = bound(samples - c.high.min(samples))?.high;
            out.push((*successor, ProbabilityInterval::new(low, high)));
        }

        let residual = unassigned_mass(&out);
        if let Some((_, outside)) = out.iter_mut().find(|(s, _)| *s == Successor::Outside) {
            outside.low = outside.low.max(residual.low);
            outside.high = outside.high.max(residual.high);
        }

        for (successor, interval) in &mut out {
            *interval = interval.round_outward(self.config.decimals);
            if counts.get(&*successor).is_some_and(|c| c.high > 0) {
                interval.low = interval.low.max(self.config.min_probability).min(interval.high);
            }
        }
        Ok((out, residual))
    }
}

/// Mass the region successors leave unassigned: at least `1 - Σhigh`, at
/// most `1 - Σlow`, over every listed successor except outside.
fn unassigned_mass(successors: &[(Successor, ProbabilityInterval)]) -> ProbabilityInterval {
    let (low_sum, high_sum) = successors
        .iter()
        .filter(|(s, _)| *s != Successor::Outside)
        .fold((0.0, 0.0), |(lo, hi), (_, i)| (lo + i.low, hi + i.high));
    let high = (1.0 - low_sum).max(0.0).min(1.0);
    ProbabilityInterval::new((1.0 - high_sum).max(0.0).min(high), high)
}

/// Point estimates `(low + high) / 2N` for regions; outside takes the rest.
fn estimate_successors(
    counts: &BTreeMap<Successor, SuccessorCounts>,
    samples: u64,
) -> Vec<(Successor, ProbabilityInterval)> {
    let n = samples as f64;
    let regions: Vec<(Successor, f64)> = counts
        .iter()
        .filter(|(s, c)| **s != Successor::Outside && c.high > 0)
        .map(|(s, c)| (*s, ((c.low + c.high) as f64 / (2.0 * n)).min(1.0)))
        .collect();
    let outside = (1.0 - regions.iter().map(|(_, p)| p).sum::<f64>()).max(0.0);

    std::iter::once((Successor::Outside, ProbabilityInterval::point(outside)))
        .chain(
            regions
                .into_iter()
                .map(|(s, p)| (s, ProbabilityInterval::point(p))),
        )
        .collect()
}
