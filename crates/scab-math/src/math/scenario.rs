//! Scenario-approach confidence bounds on transition probabilities.
//!
//! `N` i.i.d. samples are drawn and `k` of them fall outside an event
//! (they are *discarded* when fitting the event). With confidence
//! parameter `β`, the probability `p` of the event satisfies
//!
//! ```text
//! P( p̲(k) ≤ p ≤ p̄(k) ) ≥ 1 − β / N
//! ```
//!
//! where both bounds are roots of the binomial tail
//!
//! ```text
//! β / 2N = Σ_{i=0}^{k}  C(N,i) (1−p)^i p^{N−i}      (lower, p̲)
//! β / 2N = Σ_{i=k}^{N}  C(N,i) (1−p)^i p^{N−i}      (upper, p̄)
//! ```
//!
//! Each tail is a regularized incomplete beta function, so the roots are
//! beta quantiles:
//!
//! * `p̲(k) = I⁻¹(β/2N; N−k, k+1)` with `p̲(N) = 0`,
//! * `p̄(k) = 1 − I⁻¹(β/2N; k, N−k+1)` with `p̄(0) = 1`.
//!
//! Both are distribution-free: nothing is assumed about the noise beyond
//! independence of the samples.

use serde::{Deserialize, Serialize};

use super::beta::beta_quantile;
use super::stable::{log1m, log_binomial, log_sum_exp};

/// Smallest certified lower bound an event seen in every sample must reach
/// before a sample budget is considered informative.
///
/// This is the "more likely than not" level. With fewer samples the bound
/// `p̲(0) = (β/2N)^{1/N}` stays below one half, so no observation count can
/// certify that any successor is the probable one, and every region
/// interval spans most of `[0, 1]`. For β = 1e-8 the threshold is reached
/// at a few dozen samples; `minimum_samples` reports the exact count.
pub const MIN_INFORMATIVE_BOUND: f64 = 0.5;

/// One row of a bound table: the interval for `discarded` samples outside
/// the event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRow {
    pub discarded: u64,
    pub low: f64,
    pub high: f64,
}

/// Per-bound tail mass β / (2N).
pub fn tail_mass(samples: u64, confidence: f64) -> f64 {
    confidence / (2.0 * samples as f64)
}

/// Lower bound p̲ for an event that `discarded` of `samples` samples missed.
///
/// Returns NaN for invalid arguments (`samples == 0`, `discarded > samples`,
/// confidence outside (0, 1)).
pub fn lower_bound(samples: u64, discarded: u64, confidence: f64) -> f64 {
    if !valid(samples, discarded, confidence) {
        return f64::NAN;
    }
    if discarded == samples {
        return 0.0;
    }
    let n = samples as f64;
    let k = discarded as f64;
    let tail = tail_mass(samples, confidence);
    if discarded == 0 {
        // I_p(N, 1) = p^N
        return (tail.ln() / n).exp();
    }
    beta_quantile(tail, n - k, k + 1.0)
}

/// Upper bound p̄ for an event that `discarded` of `samples` samples missed.
pub fn upper_bound(samples: u64, discarded: u64, confidence: f64) -> f64 {
    if !valid(samples, discarded, confidence) {
        return f64::NAN;
    }
    if discarded == 0 {
        return 1.0;
    }
    let n = samples as f64;
    let k = discarded as f64;
    let tail = tail_mass(samples, confidence);
    if discarded == samples {
        // 1 − (β/2N)^{1/N}, kept accurate when the root is close to one
        return -(tail.ln() / n).exp_m1();
    }
    1.0 - beta_quantile(tail, k, n - k + 1.0)
}

/// Both bounds as a table row.
pub fn bound_row(samples: u64, discarded: u64, confidence: f64) -> ScenarioRow {
    ScenarioRow {
        discarded,
        low: lower_bound(samples, discarded, confidence),
        high: upper_bound(samples, discarded, confidence),
    }
}

/// Full table for `discarded = 0..=samples`.
pub fn bound_table(samples: u64, confidence: f64) -> Vec<ScenarioRow> {
    (0..=samples)
        .map(|k| bound_row(samples, k, confidence))
        .collect()
}

/// Binomial tail Σ_{i=0}^{k} C(N,i) (1−p)^i p^{N−i}: probability that at
/// most `discarded` samples miss an event of probability `p`.
pub fn discard_tail(samples: u64, discarded: u64, p: f64) -> f64 {
    if !(0.0..=1.0).contains(&p) || discarded > samples {
        return f64::NAN;
    }
    if discarded == samples {
        return 1.0;
    }
    if p == 0.0 {
        return 0.0;
    }
    let ln_p = p.ln();
    let ln_q = log1m(p);
    let terms: Vec<f64> = (0..=discarded)
        .map(|i| {
            let miss = if i == 0 { 0.0 } else { i as f64 * ln_q };
            log_binomial(samples, i) + miss + (samples - i) as f64 * ln_p
        })
        .collect();
    log_sum_exp(&terms).exp().min(1.0)
}

/// p̲(0) = (β/2N)^{1/N}: the best lower bound any event can receive.
pub fn certain_event_bound(samples: u64, confidence: f64) -> f64 {
    lower_bound(samples, 0, confidence)
}

/// Smallest `N` whose [`certain_event_bound`] reaches `threshold`.
///
/// Returns `None` when the threshold is not in (0, 1) or the confidence is
/// invalid.
pub fn minimum_samples(confidence: f64, threshold: f64) -> Option<u64> {
    if !(threshold > 0.0 && threshold < 1.0) || !(confidence > 0.0 && confidence < 1.0) {
        return None;
    }
    let reaches = |n: u64| certain_event_bound(n, confidence) >= threshold;
    let mut high = 1_u64;
    while !reaches(high) {
        high = high.checked_mul(2)?;
    }
    let mut low = high / 2;
    // invariant: !reaches(low) || low == 0, reaches(high)
    while high - low > 1 {
        let mid = low + (high - low) / 2;
        if reaches(mid) {
            high = mid;
        } else {
            low = mid;
        }
    }
    Some(high)
}

fn valid(samples: u64, discarded: u64, confidence: f64) -> bool {
    samples > 0 && discarded <= samples && confidence > 0.0 && confidence < 1.0
}
