//! Scenario abstraction math utilities.

pub mod math;

pub use math::beta::*;
pub use math::binomial;
pub use math::scenario;
pub use math::stable::*;
