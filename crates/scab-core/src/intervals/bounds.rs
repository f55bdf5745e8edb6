//! Scenario-bound lookup: direct computation, precomputed tables, or both.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use scab_common::{Error, Result};
use scab_math::scenario;
use tracing::debug;

use super::ProbabilityInterval;
use crate::logging::event_names;

/// Interval for an event that `discarded` of `samples` samples missed, at
/// confidence `confidence`.
///
/// Implementations are shared read-only across worker threads.
pub trait BoundLookup: Send + Sync {
    fn lookup(&self, samples: u64, confidence: f64, discarded: u64) -> Option<ProbabilityInterval>;
}

/// Direct computation with a lazily filled per-`k` cache for one
/// `(samples, confidence)` pair. Other pairs are computed on demand.
#[derive(Debug)]
pub struct ScenarioBounds {
    samples: u64,
    confidence: f64,
    cache: Vec<OnceLock<ProbabilityInterval>>,
}

impl ScenarioBounds {
    pub fn new(samples: u64, confidence: f64) -> Self {
        let cache = (0..=samples).map(|_| OnceLock::new()).collect();
        Self {
            samples,
            confidence,
            cache,
        }
    }

    fn compute(samples: u64, confidence: f64, discarded: u64) -> Option<ProbabilityInterval> {
        let row = scenario::bound_row(samples, discarded, confidence);
        let interval = ProbabilityInterval::new(row.low, row.high);
        interval.is_valid().then_some(interval)
    }
}

impl BoundLookup for ScenarioBounds {
    fn lookup(&self, samples: u64, confidence: f64, discarded: u64) -> Option<ProbabilityInterval> {
        if samples == self.samples && confidence == self.confidence {
            let cell = self.cache.get(discarded as usize)?;
            if let Some(hit) = cell.get() {
                return Some(*hit);
            }
            let computed = Self::compute(samples, confidence, discarded)?;
            return Some(*cell.get_or_init(|| computed));
        }
        Self::compute(samples, confidence, discarded)
    }
}

/// One precomputed table: rows indexed by the discarded count.
#[derive(Debug, Clone)]
struct BoundTable {
    samples: u64,
    confidence: f64,
    rows: Vec<Option<ProbabilityInterval>>,
}

/// Precomputed bound tables, keyed by sample count and confidence.
///
/// Files are named `<anything>_N=<samples>_beta=<confidence>.csv`. The first
/// line is a header; every row is `k, ..., low, high` where only the first
/// and the last two columns are read.
#[derive(Debug, Clone, Default)]
pub struct TabulatedBounds {
    tables: HashMap<u64, Vec<BoundTable>>,
}

impl TabulatedBounds {
    /// Load the tables for a `samples` budget: a single table file, or every
    /// matching `.csv` in a directory. Directory tables for other sample
    /// counts are skipped; a single file for another count is an error.
    pub fn load(path: &Path, samples: u64) -> Result<Self> {
        let mut bounds = Self::default();
        if path.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv")))
                .collect();
            files.sort();
            for file in files {
                match table_key(&file) {
                    Some((n, _)) if n == samples => bounds.insert_file(&file, samples)?,
                    Some((n, _)) => {
                        debug!(
                            path = %file.display(),
                            table_samples = n,
                            samples,
                            "skipping table for another sample count"
                        );
                    }
                    None => {
                        debug!(path = %file.display(), "skipping csv without N=/beta= in its name");
                    }
                }
            }
        } else {
            bounds.insert_file(path, samples)?;
        }
        tracing::info!(
            target: event_names::BOUNDS_TABLE_LOADED,
            tables = bounds.len(),
            path = %path.display(),
            "bound tables loaded"
        );
        Ok(bounds)
    }

    fn insert_file(&mut self, path: &Path, budget: u64) -> Result<()> {
        let (samples, confidence) = table_key(path).ok_or_else(|| {
            Error::Config(format!(
                "bound table {} is not named <name>_N=<samples>_beta=<confidence>.csv",
                path.display()
            ))
        })?;
        if samples != budget {
            return Err(Error::Config(format!(
                "bound table {} is for N={samples}, sampling uses N={budget}",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        let rows = parse_table(&content, samples)
            .map_err(|reason| Error::Config(format!("bound table {}: {reason}", path.display())))?;
        self.insert(samples, confidence, rows);
        Ok(())
    }

    /// Register a table built in memory; `rows[k]` is the interval for `k`
    /// discarded samples.
    pub fn insert(&mut self, samples: u64, confidence: f64, rows: Vec<Option<ProbabilityInterval>>) {
        let tables = self.tables.entry(samples).or_default();
        tables.retain(|t| !same_confidence(t.confidence, confidence));
        tables.push(BoundTable {
            samples,
            confidence,
            rows,
        });
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl BoundLookup for TabulatedBounds {
    fn lookup(&self, samples: u64, confidence: f64, discarded: u64) -> Option<ProbabilityInterval> {
        self.tables
            .get(&samples)?
            .iter()
            .find(|t| t.samples == samples && same_confidence(t.confidence, confidence))?
            .rows
            .get(discarded as usize)
            .copied()
            .flatten()
    }
}

/// Table first, direct computation on a miss.
#[derive(Debug)]
pub struct LayeredBounds {
    table: TabulatedBounds,
    direct: ScenarioBounds,
}

impl LayeredBounds {
    pub fn new(table: TabulatedBounds, direct: ScenarioBounds) -> Self {
        Self { table, direct }
    }
}

impl BoundLookup for LayeredBounds {
    fn lookup(&self, samples: u64, confidence: f64, discarded: u64) -> Option<ProbabilityInterval> {
        self.table
            .lookup(samples, confidence, discarded)
            .or_else(|| self.direct.lookup(samples, confidence, discarded))
    }
}

/// File name of a table for `(samples, confidence)`.
pub fn table_file_name(prefix: &str, samples: u64, confidence: f64) -> String {
    format!("{prefix}_N={samples}_beta={confidence:e}.csv")
}

/// Render a table in the file format read by [`TabulatedBounds`].
pub fn render_table(samples: u64, confidence: f64) -> String {
    let mut out = String::from("k,low,high\n");
    for row in scenario::bound_table(samples, confidence) {
        out.push_str(&format!("{},{:.12},{:.12}\n", row.discarded, row.low, row.high));
    }
    out
}

fn table_key(path: &Path) -> Option<(u64, f64)> {
    let stem = path.file_stem()?.to_str()?;
    let mut samples = None;
    let mut confidence = None;
    for part in stem.split('_') {
        if let Some(v) = part.strip_prefix("N=") {
            samples = v.parse::<u64>().ok();
        } else if let Some(v) = part.strip_prefix("beta=") {
            confidence = v.parse::<f64>().ok();
        }
    }
    Some((samples?, confidence?))
}

fn parse_table(
    content: &str,
    samples: u64,
) -> std::result::Result<Vec<Option<ProbabilityInterval>>, String> {
    let max_rows = usize::try_from(samples)
        .ok()
        .and_then(|n| n.checked_add(1))
        .ok_or_else(|| format!("N={samples} is too large"))?;
    let mut rows: Vec<Option<ProbabilityInterval>> = Vec::new();
    for (lineno, line) in content.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if cells.len() < 3 {
            return Err(format!("line {}: expected at least 3 columns", lineno + 1));
        }
        let parse = |s: &str| {
            s.parse::<f64>()
                .map_err(|_| format!("line {}: '{s}' is not a number", lineno + 1))
        };
        let k = parse(cells[0])?;
        if k < 0.0 || k.fract() != 0.0 || k >= max_rows as f64 {
            return Err(format!("line {}: k={k} outside 0..={samples}", lineno + 1));
        }
        let interval = ProbabilityInterval::new(
            parse(cells[cells.len() - 2])?,
            parse(cells[cells.len() - 1])?,
        );
        if !interval.is_valid() {
            return Err(format!(
                "line {}: [{}, {}] is not a probability interval",
                lineno + 1,
                interval.low,
                interval.high
            ));
        }
        let k = k as usize;
        if k >= rows.len() {
            rows.resize(k + 1, None);
        }
        rows[k] = Some(interval);
    }
    Ok(rows)
}

fn same_confidence(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn direct_lookup_matches_closed_forms() {
        let bounds = ScenarioBounds::new(100, 1e-8);
        let zero = bounds.lookup(100, 1e-8, 100).unwrap();
        assert_eq!(zero.low, 0.0);
        assert!(zero.high > 0.0 && zero.high < 1.0);

        let full = bounds.lookup(100, 1e-8, 0).unwrap();
        assert_eq!(full.high, 1.0);
        let expected = (1e-8_f64 / 200.0).powf(1.0 / 100.0);
        assert!((full.low - expected).abs() < 1e-12);

        // cached value is stable
        assert_eq!(bounds.lookup(100, 1e-8, 0), Some(full));
    }

    #[test]
    fn direct_lookup_rejects_out_of_range() {
        let bounds = ScenarioBounds::new(10, 0.01);
        assert!(bounds.lookup(10, 0.01, 11).is_none());
        assert!(bounds.lookup(0, 0.01, 0).is_none());
    }

    #[test]
    fn rendered_table_loads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(table_file_name("scenario", 50, 1e-3));
        fs::write(&path, render_table(50, 1e-3)).unwrap();

        let table = TabulatedBounds::load(&path, 50).unwrap();
        let direct = ScenarioBounds::new(50, 1e-3);
        for k in [0, 7, 25, 50] {
            let a = table.lookup(50, 1e-3, k).unwrap();
            let b = direct.lookup(50, 1e-3, k).unwrap();
            assert!((a.low - b.low).abs() < 1e-11);
            assert!((a.high - b.high).abs() < 1e-11);
        }
        assert!(table.lookup(51, 1e-3, 0).is_none());
        assert!(table.lookup(50, 1e-4, 0).is_none());
    }

    #[test]
    fn directory_load_skips_unrelated_files() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("bounds_N=4_beta=0.01.csv"),
            "k,support,low,high\n0,x,0.5,1\n1,x,0.3,0.9\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.csv"), "a,b\n").unwrap();

        let table = TabulatedBounds::load(dir.path(), 4).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.lookup(4, 0.01, 1),
            Some(ProbabilityInterval::new(0.3, 0.9))
        );
        assert!(table.lookup(4, 0.01, 2).is_none());
    }

    #[test]
    fn malformed_table_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t_N=2_beta=0.1.csv");
        fs::write(&path, "k,low,high\n0,0.9,0.2\n").unwrap();
        assert!(matches!(TabulatedBounds::load(&path, 2), Err(Error::Config(_))));
    }

    #[test]
    fn table_for_another_sample_count_is_rejected() {
        let dir = TempDir::new().unwrap();
        let huge = dir.path().join("bounds_N=18446744073709551615_beta=0.01.csv");
        fs::write(&huge, "k,low,high\n0,0.5,1\n").unwrap();
        fs::write(
            dir.path().join("bounds_N=4_beta=0.01.csv"),
            "k,low,high\n0,0.5,1\n",
        )
        .unwrap();

        assert!(matches!(TabulatedBounds::load(&huge, 4), Err(Error::Config(_))));
        let table = TabulatedBounds::load(dir.path(), 4).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(4, 0.01, 0), Some(ProbabilityInterval::new(0.5, 1.0)));
    }

    #[test]
    fn table_rows_only_cover_listed_counts() {
        let rows = parse_table("k,low,high\n2,0.1,0.4\n", 1_000_000).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], Some(ProbabilityInterval::new(0.1, 0.4)));
        assert!(parse_table("k,low,high\n5,0.1,0.4\n", 4).is_err());
    }

    #[test]
    fn layered_falls_back_on_miss() {
        let mut table = TabulatedBounds::default();
        let mut rows = vec![None; 11];
        rows[3] = Some(ProbabilityInterval::new(0.25, 0.75));
        table.insert(10, 0.05, rows);
        let layered = LayeredBounds::new(table, ScenarioBounds::new(10, 0.05));

        assert_eq!(
            layered.lookup(10, 0.05, 3),
            Some(ProbabilityInterval::new(0.25, 0.75))
        );
        let miss = layered.lookup(10, 0.05, 4).unwrap();
        assert_eq!(miss, ScenarioBounds::new(10, 0.05).lookup(10, 0.05, 4).unwrap());
    }
}
