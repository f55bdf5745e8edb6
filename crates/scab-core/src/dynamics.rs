//! Linear dynamics `x⁺ = A x + B u + q + w` and the action set.

use nalgebra::{DMatrix, DVector};
use scab_common::{Error, Result};
use scab_config::{ActionSpec, EpistemicSpec, ModelDefinition, Representative};
use serde::{Deserialize, Serialize};

use crate::partition::Region;

/// Dense, 0-based action identifier.
pub type ActionId = u32;

/// A discretized control input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub input: Vec<f64>,
}

/// Expand an action section into the finite action set.
///
/// Grids take the Cartesian product of evenly spaced values per input
/// (endpoints included, last input varying fastest).
pub fn actions_from_spec(spec: &ActionSpec) -> Result<Vec<Action>> {
    let inputs: Vec<Vec<f64>> = match spec {
        ActionSpec::List { inputs } => inputs.clone(),
        ActionSpec::Grid {
            lower,
            upper,
            number,
        } => {
            if lower.len() != upper.len() || lower.len() != number.len() {
                return Err(Error::InvalidModel(
                    "action grid bounds and counts differ in length".into(),
                ));
            }
            let axes: Vec<Vec<f64>> = lower
                .iter()
                .zip(upper)
                .zip(number)
                .map(|((lo, hi), &n)| linspace(*lo, *hi, n))
                .collect();
            let mut out = vec![Vec::new()];
            for axis in &axes {
                out = out
                    .into_iter()
                    .flat_map(|prefix: Vec<f64>| {
                        axis.iter().map(move |v| {
                            let mut next = prefix.clone();
                            next.push(*v);
                            next
                        })
                    })
                    .collect();
            }
            out
        }
    };
    if inputs.is_empty() || inputs.iter().any(Vec::is_empty) {
        return Err(Error::InvalidModel("the action set is empty".into()));
    }
    Ok(inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| Action {
            id: i as ActionId,
            input,
        })
        .collect())
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.5 * (lo + hi)],
        _ => (0..n)
            .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

fn matrix(rows: &[Vec<f64>], nrows: usize, ncols: usize, what: &str) -> Result<DMatrix<f64>> {
    if rows.len() != nrows || rows.iter().any(|r| r.len() != ncols) {
        return Err(Error::InvalidModel(format!(
            "{what} must be {nrows}×{ncols}"
        )));
    }
    Ok(DMatrix::from_fn(nrows, ncols, |i, j| rows[i][j]))
}

/// Axis-aligned box.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBox {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LinearDynamics {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    q: DVector<f64>,
    abs_a: DMatrix<f64>,
}

impl LinearDynamics {
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>, q: DVector<f64>) -> Result<Self> {
        let n = a.nrows();
        if n == 0 || a.ncols() != n {
            return Err(Error::InvalidModel("A must be square and non-empty".into()));
        }
        if b.nrows() != n || q.len() != n {
            return Err(Error::InvalidModel(format!(
                "B and q must have {n} rows"
            )));
        }
        let abs_a = a.abs();
        Ok(Self { a, b, q, abs_a })
    }

    pub fn from_model(model: &ModelDefinition) -> Result<Self> {
        let n = model.state_dim();
        let p = model.input_dim();
        let a = matrix(&model.dynamics.a, n, n, "A")?;
        let b = matrix(&model.dynamics.b, n, p, "B")?;
        let q = match &model.dynamics.q {
            Some(q) if q.len() == n => DVector::from_column_slice(q),
            Some(q) => {
                return Err(Error::InvalidModel(format!(
                    "q has {} entries, expected {n}",
                    q.len()
                )))
            }
            None => DVector::zeros(n),
        };
        Self::new(a, b, q)
    }

    pub fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    pub fn input_dim(&self) -> usize {
        self.b.ncols()
    }

    /// Deterministic part `A x + B u + q`.
    pub fn mean_step(&self, x: &[f64], u: &[f64]) -> Vec<f64> {
        let x = DVector::from_column_slice(x);
        let u = DVector::from_column_slice(u);
        (&self.a * x + &self.b * u + &self.q).iter().copied().collect()
    }

    /// One step of the true dynamics with noise realization `w`.
    pub fn step(&self, x: &[f64], u: &[f64], w: &[f64]) -> Vec<f64> {
        let mut next = self.mean_step(x, u);
        for (v, wi) in next.iter_mut().zip(w) {
            *v += wi;
        }
        next
    }

    /// Hull of `{A x + B u + q : x ∈ region}`: centre `A c + B u + q`,
    /// half-width `|A| h`. With [`Representative::Center`] the hull
    /// collapses to the image of the centre.
    pub fn image_box(&self, region: &Region, action: &Action, rep: Representative) -> ImageBox {
        let center = self.mean_step(&region.center(), &action.input);
        let half: Vec<f64> = match rep {
            Representative::Hull => {
                let h = DVector::from_vec(region.half_width());
                (&self.abs_a * h).iter().copied().collect()
            }
            Representative::Center => vec![0.0; center.len()],
        };
        ImageBox {
            lower: center.iter().zip(&half).map(|(c, h)| c - h).collect(),
            upper: center.iter().zip(&half).map(|(c, h)| c + h).collect(),
        }
    }
}

/// Parametric uncertainty `A ∈ A₀ ± ΔA`, `B ∈ B₀ ± ΔB` plus a bounded
/// additive disturbance.
#[derive(Debug, Clone)]
pub struct EpistemicBounds {
    a_dev: DMatrix<f64>,
    b_dev: DMatrix<f64>,
    d_lower: DVector<f64>,
    d_upper: DVector<f64>,
}

/// Non-negative margins subtracted from the lower and added to the upper
/// end of an image box.
#[derive(Debug, Clone, PartialEq)]
pub struct Widening {
    pub below: Vec<f64>,
    pub above: Vec<f64>,
}

impl EpistemicBounds {
    pub fn from_spec(spec: &EpistemicSpec, n: usize, p: usize) -> Result<Self> {
        let a_dev = matrix(&spec.a_deviation, n, n, "a_deviation")?;
        let b_dev = match &spec.b_deviation {
            Some(rows) => matrix(rows, n, p, "b_deviation")?,
            None => DMatrix::zeros(n, p),
        };
        if a_dev.iter().chain(b_dev.iter()).any(|v| *v < 0.0) {
            return Err(Error::InvalidModel("deviations must be non-negative".into()));
        }
        let (d_lower, d_upper) = match &spec.disturbance {
            Some(d) if d.lower.len() == n && d.upper.len() == n => (
                DVector::from_column_slice(&d.lower),
                DVector::from_column_slice(&d.upper),
            ),
            Some(_) => {
                return Err(Error::InvalidModel(format!(
                    "disturbance bounds must have {n} entries"
                )))
            }
            None => (DVector::zeros(n), DVector::zeros(n)),
        };
        Ok(Self {
            a_dev,
            b_dev,
            d_lower,
            d_upper,
        })
    }

    /// `e = ΔA·max|x| + ΔB·|u|` over the region, plus the disturbance
    /// extent on each side.
    pub fn widening(&self, region: &Region, action: &Action) -> Widening {
        let max_abs_x = DVector::from_iterator(
            region.lower.len(),
            region
                .lower
                .iter()
                .zip(&region.upper)
                .map(|(lo, hi)| lo.abs().max(hi.abs())),
        );
        let abs_u = DVector::from_iterator(action.input.len(), action.input.iter().map(|u| u.abs()));
        let e = &self.a_dev * max_abs_x + &self.b_dev * abs_u;

        Widening {
            below: e
                .iter()
                .zip(self.d_lower.iter())
                .map(|(e, d)| e + (-d).max(0.0))
                .collect(),
            above: e
                .iter()
                .zip(self.d_upper.iter())
                .map(|(e, d)| e + d.max(0.0))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::RegionKind;
    use scab_config::model::DisturbanceSpec;

    fn integrator() -> LinearDynamics {
        LinearDynamics::new(
            DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]),
            DMatrix::from_row_slice(2, 1, &[0.5, 1.0]),
            DVector::zeros(2),
        )
        .unwrap()
    }

    fn region() -> Region {
        Region {
            id: 0,
            lower: vec![-1.0, 1.0],
            upper: vec![1.0, 3.0],
            kind: RegionKind::Regular,
        }
    }

    fn action(u: f64) -> Action {
        Action {
            id: 0,
            input: vec![u],
        }
    }

    #[test]
    fn step_applies_all_terms() {
        let next = integrator().step(&[1.0, 2.0], &[2.0], &[0.1, -0.1]);
        assert!((next[0] - 4.1).abs() < 1e-12);
        assert!((next[1] - 3.9).abs() < 1e-12);
    }

    #[test]
    fn image_box_of_region() {
        let image = integrator().image_box(&region(), &action(0.0), Representative::Hull);
        // centre (0, 2) -> (2, 2); half-width |A|(1, 1) = (2, 1)
        assert_eq!(image.lower, vec![0.0, 1.0]);
        assert_eq!(image.upper, vec![4.0, 3.0]);

        let point = integrator().image_box(&region(), &action(0.0), Representative::Center);
        assert_eq!(point.lower, point.upper);
    }

    #[test]
    fn grid_actions_enumerate_product() {
        let actions = actions_from_spec(&ActionSpec::Grid {
            lower: vec![-1.0, 0.0],
            upper: vec![1.0, 1.0],
            number: vec![3, 2],
        })
        .unwrap();
        assert_eq!(actions.len(), 6);
        assert_eq!(actions[0].input, vec![-1.0, 0.0]);
        assert_eq!(actions[1].input, vec![-1.0, 1.0]);
        assert_eq!(actions[5].input, vec![1.0, 1.0]);
        assert_eq!(actions[5].id, 5);
    }

    #[test]
    fn single_value_axis_uses_midpoint() {
        assert_eq!(linspace(-2.0, 4.0, 1), vec![1.0]);
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let err = LinearDynamics::new(
            DMatrix::identity(2, 2),
            DMatrix::zeros(3, 1),
            DVector::zeros(2),
        );
        assert!(matches!(err, Err(Error::InvalidModel(_))));
    }

    #[test]
    fn widening_is_non_negative() {
        let spec = EpistemicSpec {
            a_deviation: vec![vec![0.1, 0.0], vec![0.0, 0.05]],
            b_deviation: Some(vec![vec![0.2], vec![0.0]]),
            disturbance: Some(DisturbanceSpec {
                lower: vec![-0.5, 0.1],
                upper: vec![0.5, 0.3],
            }),
        };
        let bounds = EpistemicBounds::from_spec(&spec, 2, 1).unwrap();
        let w = bounds.widening(&region(), &action(-2.0));
        // e = (0.1*1 + 0.2*2, 0.05*3) = (0.5, 0.15)
        assert!((w.below[0] - 1.0).abs() < 1e-12);
        assert!((w.above[0] - 1.0).abs() < 1e-12);
        assert!((w.below[1] - 0.15).abs() < 1e-12);
        assert!((w.above[1] - 0.45).abs() < 1e-12);
        assert!(w.below.iter().chain(&w.above).all(|m| *m >= 0.0));
    }
}
