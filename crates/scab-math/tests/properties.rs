//! Property-based tests for scab-math numerical functions.
//!
//! Uses proptest to check the bound relations across many random inputs.

use proptest::prelude::*;
use scab_math::scenario::{bound_row, discard_tail, lower_bound, tail_mass, upper_bound};
use scab_math::{beta_quantile, log_beta, log_gamma, regularized_beta};

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-10;

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

// ============================================================================
// log_gamma / log_beta properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Γ(z + 1) = z Γ(z).
    #[test]
    fn log_gamma_recurrence(z in 0.1..500.0f64) {
        let lhs = log_gamma(z + 1.0);
        let rhs = z.ln() + log_gamma(z);
        prop_assert!(approx_eq(lhs, rhs, 1e-9), "lgamma({})", z);
    }

    /// B(a, b) is symmetric.
    #[test]
    fn log_beta_symmetry(a in 0.1..1000.0f64, b in 0.1..1000.0f64) {
        prop_assert!(approx_eq(log_beta(a, b), log_beta(b, a), TOL));
    }
}

// ============================================================================
// Incomplete beta properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// I_x(a, b) lies in [0, 1] and is monotone in x.
    #[test]
    fn regularized_beta_is_cdf(a in 0.5..200.0f64, b in 0.5..200.0f64, x in 0.0..1.0f64, dx in 0.0..0.2f64) {
        let lo = regularized_beta(x, a, b);
        let hi = regularized_beta((x + dx).min(1.0), a, b);
        prop_assert!((0.0..=1.0).contains(&lo));
        prop_assert!(hi + 1e-12 >= lo, "I({}) = {} > I({}) = {}", x, lo, x + dx, hi);
    }

    /// The quantile inverts the CDF.
    #[test]
    fn quantile_round_trip(a in 0.5..500.0f64, b in 0.5..500.0f64, p in 1e-9..0.999f64) {
        let x = beta_quantile(p, a, b);
        let back = regularized_beta(x, a, b);
        prop_assert!(approx_eq(back, p, 1e-7), "a={} b={} p={} x={} back={}", a, b, p, x, back);
    }
}

// ============================================================================
// Scenario bound properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// 0 ≤ low ≤ frequency ≤ high ≤ 1 for every discard count.
    #[test]
    fn bound_brackets_frequency(n in 1u64..3000, frac in 0.0..=1.0f64, exp in 1i32..12) {
        let beta = 10f64.powi(-exp);
        let k = ((n as f64) * frac).floor() as u64;
        let row = bound_row(n, k, beta);
        let freq = (n - k) as f64 / n as f64;
        prop_assert!(row.low >= 0.0 && row.high <= 1.0);
        prop_assert!(row.low <= freq + 1e-12 && freq <= row.high + 1e-12, "n={} k={} {:?}", n, k, row);
    }

    /// Demanding more confidence (smaller β) never narrows the interval.
    #[test]
    fn smaller_beta_widens(n in 10u64..2000, frac in 0.0..=1.0f64, exp in 1i32..10) {
        let k = ((n as f64) * frac).floor() as u64;
        let loose = bound_row(n, k, 10f64.powi(-exp));
        let tight = bound_row(n, k, 10f64.powi(-exp - 1));
        prop_assert!(tight.low <= loose.low + 1e-12);
        prop_assert!(tight.high + 1e-12 >= loose.high);
    }

    /// At a fixed frequency, ten times the samples gives a narrower interval.
    #[test]
    fn more_samples_narrows(n in 20u64..400, frac in 0.0..=1.0f64, exp in 2i32..9) {
        let beta = 10f64.powi(-exp);
        let k = ((n as f64) * frac).round() as u64;
        let small = bound_row(n, k, beta);
        let large = bound_row(10 * n, 10 * k, beta);
        prop_assert!(large.high - large.low <= small.high - small.low + 1e-12);
    }

    /// The lower bound is a root of the binomial tail equation.
    #[test]
    fn lower_bound_is_tail_root(n in 5u64..400, frac in 0.0..0.95f64) {
        let beta = 1e-6;
        let k = ((n as f64) * frac).floor() as u64;
        let low = lower_bound(n, k, beta);
        let tail = discard_tail(n, k, low);
        prop_assert!(approx_eq(tail, tail_mass(n, beta), 1e-6), "n={} k={} low={} tail={}", n, k, low, tail);
        prop_assert!(upper_bound(n, k, beta) >= low);
    }
}
