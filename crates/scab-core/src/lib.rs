//! Scenario Abstraction Core Library
//!
//! This library turns a linear stochastic system into a finite interval MDP:
//! - Partitioning of the bounded state space into regions
//! - Noise sampling and clustering
//! - Scenario-based transition probability intervals
//! - iMDP assembly and PRISM exchange files
//! - Model checker invocation and Monte Carlo validation of policies
//!
//! The binary entry point is in `main.rs`.

pub mod dynamics;
pub mod exit_codes;
pub mod imdp;
pub mod intervals;
pub mod logging;
pub mod montecarlo;
pub mod noise;
pub mod partition;
pub mod pipeline;
pub mod solver;
