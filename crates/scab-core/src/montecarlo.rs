//! Empirical validation of a synthesized policy.
//!
//! Trajectories of the true continuous dynamics are simulated from a fixed
//! initial state; at each step the containing region selects the policy
//! action. The satisfaction frequency is reported with a Clopper–Pearson
//! interval next to the analytical value from the model checker.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use scab_common::{Error, Result};
use scab_math::binomial;
use serde::Serialize;

use crate::dynamics::{Action, LinearDynamics};
use crate::noise::NoiseDistribution;
use crate::partition::{Partition, RegionId, RegionKind};
use crate::solver::Policy;

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloConfig {
    pub trials: u64,
    /// Coverage of the reported interval.
    pub confidence: f64,
    /// Steps simulated per trajectory.
    pub horizon: u32,
    /// Trial `i` uses seed `seed + i`; fresh entropy when absent.
    pub seed: Option<u64>,
}

/// How one trajectory ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialOutcome {
    Reached,
    Critical,
    LeftDomain,
    NoAction,
    HorizonExceeded,
}

impl TrialOutcome {
    pub fn is_success(self) -> bool {
        self == TrialOutcome::Reached
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub reached: u64,
    pub critical: u64,
    pub left_domain: u64,
    pub no_action: u64,
    pub horizon_exceeded: u64,
}

impl OutcomeCounts {
    fn record(&mut self, outcome: TrialOutcome) {
        match outcome {
            TrialOutcome::Reached => self.reached += 1,
            TrialOutcome::Critical => self.critical += 1,
            TrialOutcome::LeftDomain => self.left_domain += 1,
            TrialOutcome::NoAction => self.no_action += 1,
            TrialOutcome::HorizonExceeded => self.horizon_exceeded += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloReport {
    pub initial_region: RegionId,
    pub trials: u64,
    pub successes: u64,
    pub frequency: f64,
    pub interval_low: f64,
    pub interval_high: f64,
    pub confidence: f64,
    /// Guaranteed value of the initial region, when a solver ran.
    pub analytical: Option<f64>,
    pub outcomes: OutcomeCounts,
}

/// Simulates the closed loop of dynamics, partition and policy.
pub struct MonteCarloValidator<'a> {
    dynamics: &'a LinearDynamics,
    partition: &'a Partition,
    actions: &'a [Action],
    noise: &'a NoiseDistribution,
    policy: &'a Policy,
}

impl<'a> MonteCarloValidator<'a> {
    pub fn new(
        dynamics: &'a LinearDynamics,
        partition: &'a Partition,
        actions: &'a [Action],
        noise: &'a NoiseDistribution,
        policy: &'a Policy,
    ) -> Self {
        Self {
            dynamics,
            partition,
            actions,
            noise,
            policy,
        }
    }

    pub fn validate(
        &self,
        initial_state: &[f64],
        config: &MonteCarloConfig,
        analytical: Option<f64>,
    ) -> Result<MonteCarloReport> {
        if config.trials == 0 {
            return Err(Error::Config("monte_carlo.trials must be positive".into()));
        }
        let initial_region = self.partition.locate(initial_state).ok_or_else(|| {
            Error::Config(format!(
                "initial state {initial_state:?} lies outside the domain"
            ))
        })?;
        let base = config.seed.unwrap_or_else(rand::random);

        let outcomes: Vec<TrialOutcome> = (0..config.trials)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(base.wrapping_add(i));
                self.trial(initial_state, config.horizon, &mut rng)
            })
            .collect();

        let mut counts = OutcomeCounts::default();
        for outcome in &outcomes {
            counts.record(*outcome);
        }
        let successes = counts.reached;
        let (low, high) = binomial::clopper_pearson(successes, config.trials, config.confidence)
            .ok_or_else(|| {
                Error::Config(format!(
                    "monte_carlo.confidence must lie in (0, 1), got {}",
                    config.confidence
                ))
            })?;

        Ok(MonteCarloReport {
            initial_region,
            trials: config.trials,
            successes,
            frequency: binomial::frequency(successes, config.trials),
            interval_low: low,
            interval_high: high,
            confidence: config.confidence,
            analytical,
            outcomes: counts,
        })
    }

    /// One trajectory; the reach-avoid property is checked before every step and
    /// once more after the last.
    fn trial(&self, initial_state: &[f64], horizon: u32, rng: &mut StdRng) -> TrialOutcome {
        let mut x = initial_state.to_vec();
        for t in 0..=horizon as usize {
            let Some(id) = self.partition.locate(&x) else {
                return TrialOutcome::LeftDomain;
            };
            match self.partition.region(id).map(|r| r.kind) {
                Some(RegionKind::Target) => return TrialOutcome::Reached,
                Some(RegionKind::Critical) => return TrialOutcome::Critical,
                Some(RegionKind::Regular) => {}
                None => return TrialOutcome::LeftDomain,
            }
            if t == horizon as usize {
                break;
            }
            let Some(action) = self
                .policy
                .action(t, id)
                .and_then(|a| self.actions.get(a as usize))
            else {
                return TrialOutcome::NoAction;
            };
            let w = self.noise.draw(rng);
            x = self.dynamics.step(&x, &action.input, &w);
        }
        TrialOutcome::HorizonExceeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};
    use scab_config::AxisRange;

    fn setup() -> (LinearDynamics, Partition, Vec<Action>, NoiseDistribution) {
        let dynamics = LinearDynamics::new(
            DMatrix::identity(1, 1),
            DMatrix::from_element(1, 1, 1.0),
            DVector::zeros(1),
        )
        .unwrap();
        let mut partition = Partition::uniform(&[[0.0, 5.0]], &[5]).unwrap();
        partition.label(
            &[vec![AxisRange::Bounds([4.0, 5.0])]],
            &[vec![AxisRange::Bounds([0.0, 1.0])]],
        );
        let actions = vec![
            Action {
                id: 0,
                input: vec![-1.0],
            },
            Action {
                id: 1,
                input: vec![1.0],
            },
        ];
        let noise = NoiseDistribution::empirical(vec![vec![0.0]]).unwrap();
        (dynamics, partition, actions, noise)
    }

    fn config(horizon: u32) -> MonteCarloConfig {
        MonteCarloConfig {
            trials: 200,
            confidence: 0.95,
            horizon,
            seed: Some(11),
        }
    }

    #[test]
    fn moving_right_always_reaches_target() {
        let (dynamics, partition, actions, noise) = setup();
        let policy = Policy::stationary(vec![None, None, Some(1), Some(1), Some(1), None]);
        let validator = MonteCarloValidator::new(&dynamics, &partition, &actions, &noise, &policy);
        let report = validator.validate(&[1.5], &config(10), Some(0.97)).unwrap();
        assert_eq!(report.initial_region, 1);
        assert_eq!(report.successes, 200);
        assert_eq!(report.frequency, 1.0);
        assert_eq!(report.interval_high, 1.0);
        assert!(report.interval_low > 0.95);
        assert_eq!(report.analytical, Some(0.97));
    }

    #[test]
    fn moving_left_hits_critical_region() {
        let (dynamics, partition, actions, noise) = setup();
        let policy = Policy::stationary(vec![None, None, Some(0), Some(0), Some(0), None]);
        let validator = MonteCarloValidator::new(&dynamics, &partition, &actions, &noise, &policy);
        let report = validator.validate(&[2.5], &config(10), None).unwrap();
        assert_eq!(report.successes, 0);
        assert_eq!(report.outcomes.critical, 200);
        assert_eq!(report.interval_low, 0.0);
    }

    #[test]
    fn short_horizon_and_missing_actions_fail() {
        let (dynamics, partition, actions, noise) = setup();
        let policy = Policy::stationary(vec![None, None, Some(1), Some(1), Some(1), None]);
        let validator = MonteCarloValidator::new(&dynamics, &partition, &actions, &noise, &policy);
        let report = validator.validate(&[1.5], &config(2), None).unwrap();
        assert_eq!(report.outcomes.horizon_exceeded, 200);

        let empty = Policy::stationary(vec![]);
        let validator = MonteCarloValidator::new(&dynamics, &partition, &actions, &noise, &empty);
        let report = validator.validate(&[1.5], &config(10), None).unwrap();
        assert_eq!(report.outcomes.no_action, 200);
    }

    #[test]
    fn rejects_initial_state_outside_domain() {
        let (dynamics, partition, actions, noise) = setup();
        let policy = Policy::stationary(vec![]);
        let validator = MonteCarloValidator::new(&dynamics, &partition, &actions, &noise, &policy);
        assert!(matches!(
            validator.validate(&[9.0], &config(5), None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn seeded_runs_repeat() {
        let (dynamics, partition, actions, _) = setup();
        let noise = NoiseDistribution::empirical(vec![vec![-1.0], vec![0.0], vec![1.0]]).unwrap();
        let policy = Policy::stationary(vec![None, None, Some(1), Some(1), Some(1), None]);
        let validator = MonteCarloValidator::new(&dynamics, &partition, &actions, &noise, &policy);
        let a = validator.validate(&[2.5], &config(2), None).unwrap();
        let b = validator.validate(&[2.5], &config(2), None).unwrap();
        assert_eq!(a, b);
        assert!(a.successes > 0 && a.successes < 200);
    }
}
