//! Interval MDP assembly.
//!
//! State 0 is the outside state; region `r` is state `r + 1`. Outside,
//! target and critical states are absorbing with a single `[1, 1]`
//! self-loop that carries no action label.

pub mod exchange;

pub use exchange::{parse_exchange, property, write_exchange, ExchangeFiles};

use std::collections::{BTreeMap, BTreeSet};

use scab_common::{Error, Result};
use scab_config::MdpMode;
use serde::Serialize;

use crate::dynamics::{Action, ActionId};
use crate::intervals::{ProbabilityInterval, StateActionDistribution, Successor};
use crate::partition::{Partition, RegionId, RegionKind};

/// Dense iMDP state index.
pub type StateId = u32;

/// One enabled choice of a state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    /// None for the self-loop of an absorbing state.
    pub action: Option<ActionId>,
    pub transitions: Vec<(StateId, ProbabilityInterval)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntervalMdp {
    mode: MdpMode,
    choices: Vec<Vec<Choice>>,
    initial: BTreeSet<StateId>,
    targets: BTreeSet<StateId>,
    critical: BTreeSet<StateId>,
}

/// Size summary for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImdpSize {
    pub states: usize,
    pub choices: usize,
    pub transitions: usize,
}

impl IntervalMdp {
    pub fn mode(&self) -> MdpMode {
        self.mode
    }

    pub fn num_states(&self) -> usize {
        self.choices.len()
    }

    pub fn num_choices(&self) -> usize {
        self.choices.iter().map(Vec::len).sum()
    }

    pub fn num_transitions(&self) -> usize {
        self.choices
            .iter()
            .flatten()
            .map(|c| c.transitions.len())
            .sum()
    }

    pub fn size(&self) -> ImdpSize {
        ImdpSize {
            states: self.num_states(),
            choices: self.num_choices(),
            transitions: self.num_transitions(),
        }
    }

    pub fn choices(&self, state: StateId) -> &[Choice] {
        self.choices
            .get(state as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn initial_states(&self) -> &BTreeSet<StateId> {
        &self.initial
    }

    pub fn target_states(&self) -> &BTreeSet<StateId> {
        &self.targets
    }

    pub fn critical_states(&self) -> &BTreeSet<StateId> {
        &self.critical
    }

    pub fn is_absorbing(&self, state: StateId) -> bool {
        state == 0 || self.targets.contains(&state) || self.critical.contains(&state)
    }

    /// Every interval of every choice, with its location.
    fn intervals(&self) -> impl Iterator<Item = (StateId, usize, StateId, ProbabilityInterval)> + '_ {
        self.choices.iter().enumerate().flat_map(|(s, choices)| {
            choices.iter().enumerate().flat_map(move |(c, choice)| {
                choice
                    .transitions
                    .iter()
                    .map(move |(t, i)| (s as StateId, c, *t, *i))
            })
        })
    }

    /// `SerializationError` for the first interval outside `0 ≤ low ≤ high ≤ 1`.
    pub fn check_intervals(&self) -> Result<()> {
        match self.intervals().find(|(_, _, _, i)| !i.is_valid()) {
            Some((s, c, t, i)) => Err(Error::Serialization(format!(
                "state {s}, choice {c}, successor {t}: [{}, {}] is not a probability interval",
                i.low, i.high
            ))),
            None => Ok(()),
        }
    }
}

/// Assembles an [`IntervalMdp`] from per (region, action) distributions.
pub struct ImdpBuilder<'a> {
    partition: &'a Partition,
    actions: &'a [Action],
    mode: MdpMode,
    initial_state: Option<&'a [f64]>,
}

impl<'a> ImdpBuilder<'a> {
    pub fn new(partition: &'a Partition, actions: &'a [Action]) -> Self {
        Self {
            partition,
            actions,
            mode: MdpMode::Interval,
            initial_state: None,
        }
    }

    pub fn mode(mut self, mode: MdpMode) -> Self {
        self.mode = mode;
        self
    }

    /// Mark the region containing `x` as the initial state. Without one,
    /// every regular region is initial.
    pub fn initial_state(mut self, x: Option<&'a [f64]>) -> Self {
        self.initial_state = x;
        self
    }

    pub fn build(
        &self,
        distributions: &BTreeMap<(RegionId, ActionId), StateActionDistribution>,
    ) -> Result<IntervalMdp> {
        let regions = self.partition.regions();
        let mut choices = Vec::with_capacity(regions.len() + 1);
        let mut targets = BTreeSet::new();
        let mut critical = BTreeSet::new();

        choices.push(vec![self_loop(0)]);
        for region in regions {
            let state = Successor::Region(region.id).state();
            match region.kind {
                RegionKind::Target => {
                    targets.insert(state);
                    choices.push(vec![self_loop(state)]);
                }
                RegionKind::Critical => {
                    critical.insert(state);
                    choices.push(vec![self_loop(state)]);
                }
                RegionKind::Regular => {
                    let mut enabled = Vec::with_capacity(self.actions.len());
                    for action in self.actions {
                        let dist = distributions.get(&(region.id, action.id)).ok_or_else(|| {
                            Error::Serialization(format!(
                                "region {} has no distribution for action {}",
                                region.id, action.id
                            ))
                        })?;
                        enabled.push(Choice {
                            action: Some(action.id),
                            transitions: dist
                                .successors
                                .iter()
                                .map(|(s, i)| (s.state(), *i))
                                .collect(),
                        });
                    }
                    choices.push(enabled);
                }
            }
        }

        let initial = match self.initial_state {
            Some(x) => {
                let id = self.partition.locate(x).ok_or_else(|| {
                    Error::Config(format!("initial state {x:?} lies outside the domain"))
                })?;
                BTreeSet::from([Successor::Region(id).state()])
            }
            None => regions
                .iter()
                .filter(|r| !r.is_absorbing())
                .map(|r| Successor::Region(r.id).state())
                .collect(),
        };

        let mdp = IntervalMdp {
            mode: self.mode,
            choices,
            initial,
            targets,
            critical,
        };
        mdp.check_intervals()?;
        Ok(mdp)
    }
}

fn self_loop(state: StateId) -> Choice {
    Choice {
        action: None,
        transitions: vec![(state, ProbabilityInterval::CERTAIN)],
    }
}
