//! Process-noise sampling and clustering of near-identical samples.

use nalgebra::{Cholesky, DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use scab_common::{Error, Result};
use scab_config::NoiseSpec;

/// One raw noise realization.
pub type NoiseSample = Vec<f64>;

/// Weighted box of samples; an unclustered sample is a degenerate box of
/// weight one.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleCluster {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub weight: u64,
}

impl SampleCluster {
    fn point(sample: &[f64]) -> Self {
        Self {
            lower: sample.to_vec(),
            upper: sample.to_vec(),
            weight: 1,
        }
    }

    fn absorb(&mut self, sample: &[f64]) {
        for ((lo, hi), v) in self.lower.iter_mut().zip(&mut self.upper).zip(sample) {
            *lo = lo.min(*v);
            *hi = hi.max(*v);
        }
        self.weight += 1;
    }
}

#[derive(Debug, Clone)]
pub enum NoiseDistribution {
    /// `mean + L z` with `L` the Cholesky factor of the covariance.
    Gaussian {
        mean: DVector<f64>,
        factor: DMatrix<f64>,
    },
    /// Uniform resampling from a fixed pool.
    Empirical { pool: Vec<NoiseSample> },
}

impl NoiseDistribution {
    pub fn gaussian(mean: Vec<f64>, covariance: DMatrix<f64>) -> Result<Self> {
        let n = covariance.nrows();
        if covariance.ncols() != n || mean.len() != n {
            return Err(Error::InvalidModel(format!(
                "noise covariance must be {n}×{n} with a mean of length {n}"
            )));
        }
        let factor = Cholesky::new(covariance)
            .ok_or_else(|| {
                Error::InvalidModel("noise covariance is not positive definite".into())
            })?
            .l();
        Ok(NoiseDistribution::Gaussian {
            mean: DVector::from_vec(mean),
            factor,
        })
    }

    pub fn empirical(pool: Vec<NoiseSample>) -> Result<Self> {
        let dim = pool
            .first()
            .map(Vec::len)
            .ok_or_else(|| Error::InvalidModel("empirical noise pool is empty".into()))?;
        if pool.iter().any(|s| s.len() != dim) {
            return Err(Error::InvalidModel(
                "empirical noise vectors differ in length".into(),
            ));
        }
        Ok(NoiseDistribution::Empirical { pool })
    }

    /// Build from a model's noise section; `dim` is the state dimension.
    pub fn from_spec(spec: &NoiseSpec, dim: usize) -> Result<Self> {
        let dist = match spec {
            NoiseSpec::Gaussian { covariance, mean } => {
                if covariance.len() != dim || covariance.iter().any(|r| r.len() != dim) {
                    return Err(Error::InvalidModel(format!(
                        "noise covariance must be {dim}×{dim}"
                    )));
                }
                let cov = DMatrix::from_fn(dim, dim, |i, j| covariance[i][j]);
                let mean = mean.clone().unwrap_or_else(|| vec![0.0; dim]);
                Self::gaussian(mean, cov)?
            }
            NoiseSpec::Empirical { samples, .. } => Self::empirical(samples.clone())?,
        };
        if dist.dim() != dim {
            return Err(Error::InvalidModel(format!(
                "noise has dimension {}, state has {dim}",
                dist.dim()
            )));
        }
        Ok(dist)
    }

    pub fn dim(&self) -> usize {
        match self {
            NoiseDistribution::Gaussian { mean, .. } => mean.len(),
            NoiseDistribution::Empirical { pool } => pool.first().map_or(0, Vec::len),
        }
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> NoiseSample {
        match self {
            NoiseDistribution::Gaussian { mean, factor } => {
                let z = DVector::from_fn(mean.len(), |_, _| rng.sample::<f64, _>(StandardNormal));
                (mean + factor * z).iter().copied().collect()
            }
            NoiseDistribution::Empirical { pool } => pool[rng.random_range(0..pool.len())].clone(),
        }
    }
}

/// Seeded source of noise samples.
#[derive(Debug, Clone)]
pub struct NoiseSampler {
    dist: NoiseDistribution,
    rng: StdRng,
}

impl NoiseSampler {
    /// Fresh entropy when `seed` is None.
    pub fn new(dist: NoiseDistribution, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { dist, rng }
    }

    pub fn distribution(&self) -> &NoiseDistribution {
        &self.dist
    }

    /// `n` i.i.d. samples.
    pub fn sample(&mut self, n: u64) -> Result<Vec<NoiseSample>> {
        if n == 0 {
            return Err(Error::Config("sample count must be positive".into()));
        }
        Ok((0..n).map(|_| self.dist.draw(&mut self.rng)).collect())
    }
}

/// Greedy clustering: the first unassigned sample opens a cluster that
/// takes every unassigned sample within Euclidean distance `radius` of it.
///
/// The total weight equals `samples.len()`. A radius of zero yields one
/// degenerate cluster per sample.
pub fn cluster(samples: &[NoiseSample], radius: f64) -> Vec<SampleCluster> {
    if radius <= 0.0 {
        return samples.iter().map(|s| SampleCluster::point(s)).collect();
    }
    let r2 = radius * radius;
    let mut assigned = vec![false; samples.len()];
    let mut clusters = Vec::new();
    for i in 0..samples.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let seed = &samples[i];
        let mut c = SampleCluster::point(seed);
        for j in (i + 1)..samples.len() {
            if assigned[j] {
                continue;
            }
            let d2: f64 = seed
                .iter()
                .zip(&samples[j])
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            if d2 <= r2 {
                assigned[j] = true;
                c.absorb(&samples[j]);
            }
        }
        clusters.push(c);
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian_2d() -> NoiseDistribution {
        NoiseDistribution::gaussian(
            vec![1.0, -1.0],
            DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 1.0]),
        )
        .unwrap()
    }

    #[test]
    fn seeded_sampler_is_reproducible() {
        let a = NoiseSampler::new(gaussian_2d(), Some(9)).sample(20).unwrap();
        let b = NoiseSampler::new(gaussian_2d(), Some(9)).sample(20).unwrap();
        assert_eq!(a, b);
        let c = NoiseSampler::new(gaussian_2d(), Some(10)).sample(20).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn gaussian_moments_are_close() {
        let samples = NoiseSampler::new(gaussian_2d(), Some(1)).sample(20_000).unwrap();
        let n = samples.len() as f64;
        let mean0 = samples.iter().map(|s| s[0]).sum::<f64>() / n;
        let mean1 = samples.iter().map(|s| s[1]).sum::<f64>() / n;
        let var0 = samples.iter().map(|s| (s[0] - mean0).powi(2)).sum::<f64>() / n;
        let cov01 = samples
            .iter()
            .map(|s| (s[0] - mean0) * (s[1] - mean1))
            .sum::<f64>()
            / n;
        assert!((mean0 - 1.0).abs() < 0.05);
        assert!((mean1 + 1.0).abs() < 0.05);
        assert!((var0 - 4.0).abs() < 0.2);
        assert!((cov01 - 1.0).abs() < 0.1);
    }

    #[test]
    fn rejects_indefinite_covariance() {
        let err = NoiseDistribution::gaussian(
            vec![0.0, 0.0],
            DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]),
        );
        assert!(matches!(err, Err(Error::InvalidModel(_))));
    }

    #[test]
    fn empirical_draws_from_pool() {
        let pool = vec![vec![0.5], vec![-0.5]];
        let mut sampler =
            NoiseSampler::new(NoiseDistribution::empirical(pool.clone()).unwrap(), Some(3));
        let samples = sampler.sample(100).unwrap();
        assert!(samples.iter().all(|s| pool.contains(s)));
        assert!(samples.contains(&pool[0]) && samples.contains(&pool[1]));
    }

    #[test]
    fn zero_samples_is_an_error() {
        let mut sampler = NoiseSampler::new(gaussian_2d(), Some(0));
        assert!(matches!(sampler.sample(0), Err(Error::Config(_))));
    }

    #[test]
    fn clustering_preserves_weight_and_bounds_members() {
        let samples = vec![
            vec![0.0, 0.0],
            vec![0.05, -0.02],
            vec![1.0, 1.0],
            vec![0.01, 0.03],
            vec![1.02, 0.99],
        ];
        let clusters = cluster(&samples, 0.1);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters.iter().map(|c| c.weight).sum::<u64>(), 5);
        assert_eq!(clusters[0].weight, 3);
        assert_eq!(clusters[0].lower, vec![0.0, -0.02]);
        assert_eq!(clusters[0].upper, vec![0.05, 0.03]);
    }

    #[test]
    fn zero_radius_keeps_every_sample() {
        let samples = vec![vec![0.0], vec![0.0], vec![1.0]];
        let clusters = cluster(&samples, 0.0);
        assert_eq!(clusters.len(), 3);
        assert!(clusters.iter().all(|c| c.weight == 1 && c.lower == c.upper));
    }
}
