//! Exact binomial confidence intervals for empirical frequencies.
//!
//! Used to report Monte Carlo satisfaction frequencies next to the
//! analytical guarantee of the abstraction.

use super::beta::beta_quantile;

/// Clopper–Pearson two-sided interval for `successes` out of `trials`.
///
/// # Arguments
/// * `successes` - Observed successes (must not exceed `trials`)
/// * `trials` - Number of Bernoulli trials
/// * `level` - Coverage level in (0, 1), e.g. 0.95
///
/// # Returns
/// `Some((low, high))`, or `None` for invalid inputs.
pub fn clopper_pearson(successes: u64, trials: u64, level: f64) -> Option<(f64, f64)> {
    if trials == 0 || successes > trials || !(level > 0.0 && level < 1.0) {
        return None;
    }
    let alpha = 1.0 - level;
    let s = successes as f64;
    let f = (trials - successes) as f64;

    let low = if successes == 0 {
        0.0
    } else {
        beta_quantile(alpha / 2.0, s, f + 1.0)
    };
    let high = if successes == trials {
        1.0
    } else {
        1.0 - beta_quantile(alpha / 2.0, f, s + 1.0)
    };
    Some((low, high))
}

/// Maximum-likelihood frequency `successes / trials` (0 for no trials).
pub fn frequency(successes: u64, trials: u64) -> f64 {
    if trials == 0 {
        return 0.0;
    }
    successes as f64 / trials as f64
}
