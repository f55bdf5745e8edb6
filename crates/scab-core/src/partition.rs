//! Partition of the bounded state domain into hyper-rectangular regions.
//!
//! Regions are half-open boxes `[lower, upper)`; on each axis the upper
//! domain boundary belongs to the last region touching it, so every point
//! of the closed domain lies in exactly one region. Everything outside the
//! domain is the absorbing outside state, which is not a [`Region`].

use scab_common::{Error, Result};
use scab_config::{PartitionSpec, RegionBox};
use serde::{Deserialize, Serialize};

/// Dense, 0-based region identifier.
pub type RegionId = u32;

/// Relative tolerance of the gap check for explicit partitions.
const VOLUME_RTOL: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Regular,
    Target,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub kind: RegionKind,
}

impl Region {
    pub fn center(&self) -> Vec<f64> {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| 0.5 * (lo + hi))
            .collect()
    }

    pub fn half_width(&self) -> Vec<f64> {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| 0.5 * (hi - lo))
            .collect()
    }

    /// Target and critical regions are absorbing in the abstraction.
    pub fn is_absorbing(&self) -> bool {
        self.kind != RegionKind::Regular
    }

    fn volume(&self) -> f64 {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| hi - lo)
            .product()
    }
}

/// How a box relates to the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// Contained in the closed domain.
    Inside,
    /// Intersects the domain and sticks out of it.
    Partial,
    /// Disjoint from the domain.
    Outside,
}

/// Regions intersected by a box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxCover {
    pub regions: Vec<RegionId>,
    pub coverage: Coverage,
}

#[derive(Debug, Clone)]
struct Grid {
    number: Vec<usize>,
    width: Vec<f64>,
    strides: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Partition {
    domain: Vec<[f64; 2]>,
    regions: Vec<Region>,
    grid: Option<Grid>,
}

fn check_domain(domain: &[[f64; 2]]) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::InvalidPartition("domain has no dimensions".into()));
    }
    for (axis, [lo, hi]) in domain.iter().enumerate() {
        if !(lo.is_finite() && hi.is_finite()) || hi <= lo {
            return Err(Error::InvalidPartition(format!(
                "domain axis {axis} must have positive finite width, got [{lo}, {hi}]"
            )));
        }
    }
    Ok(())
}

impl Partition {
    /// Uniform grid with `number[d]` cells on axis `d`; ids are row-major
    /// with the last dimension varying fastest.
    pub fn uniform(domain: &[[f64; 2]], number: &[usize]) -> Result<Self> {
        check_domain(domain)?;
        if number.len() != domain.len() {
            return Err(Error::InvalidPartition(format!(
                "{} cell counts for a {}-dimensional domain",
                number.len(),
                domain.len()
            )));
        }
        if number.contains(&0) {
            return Err(Error::InvalidPartition(
                "every axis needs at least one cell".into(),
            ));
        }
        let total = number
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .filter(|&t| t <= RegionId::MAX as usize)
            .ok_or_else(|| Error::InvalidPartition("too many regions".into()))?;

        let width: Vec<f64> = domain
            .iter()
            .zip(number)
            .map(|([lo, hi], &n)| (hi - lo) / n as f64)
            .collect();
        let mut strides = vec![1usize; number.len()];
        for d in (0..number.len().saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * number[d + 1];
        }

        let mut regions = Vec::with_capacity(total);
        let mut index = vec![0usize; number.len()];
        for id in 0..total {
            let mut rem = id;
            for d in 0..number.len() {
                index[d] = rem / strides[d];
                rem %= strides[d];
            }
            let lower: Vec<f64> = (0..number.len())
                .map(|d| domain[d][0] + index[d] as f64 * width[d])
                .collect();
            // last cell ends exactly on the domain boundary
            let upper: Vec<f64> = (0..number.len())
                .map(|d| {
                    if index[d] + 1 == number[d] {
                        domain[d][1]
                    } else {
                        domain[d][0] + (index[d] + 1) as f64 * width[d]
                    }
                })
                .collect();
            regions.push(Region {
                id: id as RegionId,
                lower,
                upper,
                kind: RegionKind::Regular,
            });
        }

        Ok(Partition {
            domain: domain.to_vec(),
            regions,
            grid: Some(Grid {
                number: number.to_vec(),
                width,
                strides,
            }),
        })
    }

    /// Explicit, possibly irregular regions. They must lie inside the
    /// domain, have disjoint interiors and leave no gap.
    pub fn from_regions(domain: &[[f64; 2]], boxes: &[Vec<[f64; 2]>]) -> Result<Self> {
        check_domain(domain)?;
        if boxes.is_empty() {
            return Err(Error::InvalidPartition("no regions given".into()));
        }

        let mut regions = Vec::with_capacity(boxes.len());
        for (i, b) in boxes.iter().enumerate() {
            if b.len() != domain.len() {
                return Err(Error::InvalidPartition(format!(
                    "region {i} has {} axes, domain has {}",
                    b.len(),
                    domain.len()
                )));
            }
            for (axis, ([lo, hi], [dlo, dhi])) in b.iter().zip(domain).enumerate() {
                if hi <= lo {
                    return Err(Error::InvalidPartition(format!(
                        "region {i} has non-positive width on axis {axis}"
                    )));
                }
                if lo < dlo || hi > dhi {
                    return Err(Error::InvalidPartition(format!(
                        "region {i} leaves the domain on axis {axis}"
                    )));
                }
            }
            regions.push(Region {
                id: i as RegionId,
                lower: b.iter().map(|r| r[0]).collect(),
                upper: b.iter().map(|r| r[1]).collect(),
                kind: RegionKind::Regular,
            });
        }

        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                if interiors_intersect(&a.lower, &a.upper, &b.lower, &b.upper) {
                    return Err(Error::InvalidPartition(format!(
                        "regions {} and {} overlap",
                        a.id, b.id
                    )));
                }
            }
        }

        let domain_volume: f64 = domain.iter().map(|[lo, hi]| hi - lo).product();
        let covered: f64 = regions.iter().map(Region::volume).sum();
        if (covered - domain_volume).abs() > VOLUME_RTOL * domain_volume {
            return Err(Error::InvalidPartition(format!(
                "regions cover volume {covered} of a domain with volume {domain_volume}"
            )));
        }

        Ok(Partition {
            domain: domain.to_vec(),
            regions,
            grid: None,
        })
    }

    /// Build from a model's partition section.
    pub fn from_spec(spec: &PartitionSpec) -> Result<Self> {
        match &spec.number {
            Some(number) => Self::uniform(&spec.domain, number),
            None => Self::from_regions(&spec.domain, &spec.regions),
        }
    }

    /// Mark target and critical regions. A region is a target when it is
    /// contained in some goal box and critical when its interior meets
    /// some critical box; critical wins.
    pub fn label(&mut self, goal: &[RegionBox], critical: &[RegionBox]) {
        let resolve = |b: &RegionBox| -> (Vec<f64>, Vec<f64>) {
            b.iter()
                .zip(&self.domain)
                .map(|(axis, dom)| {
                    let [lo, hi] = axis.resolve(*dom);
                    (lo, hi)
                })
                .unzip()
        };
        let goal: Vec<_> = goal.iter().map(resolve).collect();
        let critical: Vec<_> = critical.iter().map(resolve).collect();

        for region in &mut self.regions {
            let is_critical = critical
                .iter()
                .any(|(lo, hi)| interiors_intersect(&region.lower, &region.upper, lo, hi));
            let is_target = goal.iter().any(|(lo, hi)| {
                region
                    .lower
                    .iter()
                    .zip(&region.upper)
                    .zip(lo.iter().zip(hi))
                    .all(|((rlo, rhi), (glo, ghi))| rlo >= glo && rhi <= ghi)
            });
            region.kind = if is_critical {
                RegionKind::Critical
            } else if is_target {
                RegionKind::Target
            } else {
                RegionKind::Regular
            };
        }
    }

    pub fn dim(&self) -> usize {
        self.domain.len()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn domain(&self) -> &[[f64; 2]] {
        &self.domain
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id as usize)
    }

    fn in_domain(&self, x: &[f64]) -> bool {
        x.len() == self.dim()
            && x
                .iter()
                .zip(&self.domain)
                .all(|(v, [lo, hi])| *v >= *lo && *v <= *hi)
    }

    /// Region containing `x`, or None when `x` is outside the domain (or
    /// not finite).
    pub fn locate(&self, x: &[f64]) -> Option<RegionId> {
        if !self.in_domain(x) {
            return None;
        }
        match &self.grid {
            Some(grid) => {
                let mut id = 0usize;
                for d in 0..self.dim() {
                    id += self.cell_index(grid, d, x[d]) * grid.strides[d];
                }
                Some(id as RegionId)
            }
            None => self
                .regions
                .iter()
                .find(|r| {
                    (0..self.dim()).all(|d| self.axis_contains(r.lower[d], r.upper[d], d, x[d]))
                })
                .map(|r| r.id),
        }
    }

    /// Regions met by the closed box `[lower, upper]` and its relation to
    /// the domain. Regions are listed in ascending id order.
    pub fn cover(&self, lower: &[f64], upper: &[f64]) -> BoxCover {
        let mut outside = false;
        let mut partial = false;
        for d in 0..self.dim() {
            let [dlo, dhi] = self.domain[d];
            if upper[d] < dlo || lower[d] > dhi {
                outside = true;
            } else if lower[d] < dlo || upper[d] > dhi {
                partial = true;
            }
        }
        if outside {
            return BoxCover {
                regions: Vec::new(),
                coverage: Coverage::Outside,
            };
        }
        let coverage = if partial {
            Coverage::Partial
        } else {
            Coverage::Inside
        };

        let regions = match &self.grid {
            Some(grid) => {
                let ranges: Vec<(usize, usize)> = (0..self.dim())
                    .map(|d| {
                        let lo = lower[d].max(self.domain[d][0]);
                        let hi = upper[d].min(self.domain[d][1]);
                        (self.cell_index(grid, d, lo), self.cell_index(grid, d, hi))
                    })
                    .collect();
                let mut ids = Vec::new();
                let mut index: Vec<usize> = ranges.iter().map(|r| r.0).collect();
                'cells: loop {
                    ids.push(
                        index
                            .iter()
                            .zip(&grid.strides)
                            .map(|(i, s)| i * s)
                            .sum::<usize>() as RegionId,
                    );
                    // odometer, last axis fastest, keeps ids ascending
                    for d in (0..index.len()).rev() {
                        if index[d] < ranges[d].1 {
                            index[d] += 1;
                            continue 'cells;
                        }
                        index[d] = ranges[d].0;
                    }
                    break;
                }
                ids
            }
            None => self
                .regions
                .iter()
                .filter(|r| {
                    (0..self.dim()).all(|d| {
                        let last = r.upper[d] >= self.domain[d][1];
                        let below_top = if last {
                            lower[d] <= r.upper[d]
                        } else {
                            lower[d] < r.upper[d]
                        };
                        below_top && upper[d] >= r.lower[d]
                    })
                })
                .map(|r| r.id)
                .collect(),
        };

        BoxCover { regions, coverage }
    }

    fn cell_index(&self, grid: &Grid, d: usize, v: f64) -> usize {
        let raw = ((v - self.domain[d][0]) / grid.width[d]).floor();
        if raw <= 0.0 {
            0
        } else {
            (raw as usize).min(grid.number[d] - 1)
        }
    }

    fn axis_contains(&self, lo: f64, hi: f64, d: usize, v: f64) -> bool {
        v >= lo && (v < hi || (hi >= self.domain[d][1] && v <= hi))
    }
}

fn interiors_intersect(alo: &[f64], ahi: &[f64], blo: &[f64], bhi: &[f64]) -> bool {
    alo.iter()
        .zip(ahi)
        .zip(blo.iter().zip(bhi))
        .all(|((alo, ahi), (blo, bhi))| alo < bhi && blo < ahi)
}
