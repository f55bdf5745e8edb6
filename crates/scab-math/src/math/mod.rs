//! Core math modules.

pub mod beta;
pub mod binomial;
pub mod scenario;
pub mod stable;
