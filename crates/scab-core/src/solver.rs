//! External model checker integration.
//!
//! The checker reads the exchange files written by
//! [`write_exchange`](crate::imdp::write_exchange) and writes a policy CSV
//! and a value vector CSV next to them. Anything other than a clean exit
//! with both files well formed fails the iteration.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use scab_common::{Error, Result};
use scab_config::SolverSettings;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dynamics::ActionId;
use crate::imdp::{ExchangeFiles, IntervalMdp};
use crate::logging::event_names;
use crate::partition::RegionId;

/// Leading metadata columns of each policy row.
const POLICY_SKIP_COLUMNS: usize = 3;
/// Leading metadata rows of the value vector.
const VECTOR_SKIP_ROWS: usize = 3;
/// Poll interval while waiting for the checker.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub const POLICY_FILE: &str = "policy.csv";
pub const VECTOR_FILE: &str = "vector.csv";
pub const STDOUT_FILE: &str = "solver.stdout";
pub const STDERR_FILE: &str = "solver.stderr";

/// Failures of the checker process itself.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to start {command}: {source}")]
    SpawnFailed {
        command: String,
        source: std::io::Error,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("exited with status {code}")]
    NonZeroExit { code: i32 },

    #[error("terminated by a signal")]
    KilledBySignal,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ToolError> for Error {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Timeout(d) => Error::SolverTimeout {
                seconds: d.as_secs(),
            },
            other => Error::SolverFailed(other.to_string()),
        }
    }
}

/// Time-indexed action table; a single row is a stationary policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Policy {
    /// `steps[t][state]`, first time step first.
    steps: Vec<Vec<Option<ActionId>>>,
}

impl Policy {
    pub fn new(steps: Vec<Vec<Option<ActionId>>>) -> Self {
        Self { steps }
    }

    pub fn stationary(actions: Vec<Option<ActionId>>) -> Self {
        Self {
            steps: vec![actions],
        }
    }

    /// Number of time steps the table covers.
    pub fn horizon(&self) -> usize {
        self.steps.len()
    }

    pub fn is_stationary(&self) -> bool {
        self.steps.len() == 1
    }

    /// Action for `region` at time `step`. A stationary policy answers for
    /// every step; a time-varying one has no action past its horizon.
    pub fn action(&self, step: usize, region: RegionId) -> Option<ActionId> {
        let row = if self.is_stationary() {
            self.steps.first()?
        } else {
            self.steps.get(step)?
        };
        row.get(region as usize + 1).copied().flatten()
    }
}

/// Result of solving one iMDP.
#[derive(Debug, Clone, Serialize)]
pub struct SolverOutput {
    pub policy: Policy,
    /// Optimal value per iMDP state.
    pub values: Vec<f64>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl SolverOutput {
    pub fn region_value(&self, region: RegionId) -> Option<f64> {
        self.values.get(region as usize + 1).copied()
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// Synthesizes a policy for a written iMDP.
pub trait PolicySolver {
    fn solve(&self, mdp: &IntervalMdp, files: &ExchangeFiles) -> Result<SolverOutput>;
}

/// PRISM, run as a child process.
#[derive(Debug, Clone)]
pub struct PrismSolver {
    executable: PathBuf,
    java_memory_gb: u32,
    timeout: Duration,
}

impl PrismSolver {
    pub fn new(executable: impl Into<PathBuf>, java_memory_gb: u32, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            java_memory_gb,
            timeout,
        }
    }

    pub fn from_settings(settings: &SolverSettings) -> Self {
        Self::new(
            &settings.prism_path,
            settings.java_memory_gb,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn command(
        &self,
        files: &ExchangeFiles,
        property: &str,
        policy: &Path,
        vector: &Path,
    ) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("-javamaxmem")
            .arg(format!("{}g", self.java_memory_gb))
            .arg("-importmodel")
            .arg(files.import_argument())
            .arg("-pf")
            .arg(property)
            .arg("-ex")
            .arg("-exportadv")
            .arg(policy)
            .arg("-exportvector")
            .arg(vector);
        cmd
    }

    fn wait(&self, child: &mut Child) -> std::result::Result<ExitStatus, ToolError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                warn!(pid = child.id(), "model checker timed out, killing");
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl PolicySolver for PrismSolver {
    fn solve(&self, mdp: &IntervalMdp, files: &ExchangeFiles) -> Result<SolverOutput> {
        let dir = files
            .tra
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let property = fs::read_to_string(&files.pctl)?;
        let property = property.trim();
        let policy_path = dir.join(POLICY_FILE);
        let vector_path = dir.join(VECTOR_FILE);

        let mut cmd = self.command(files, property, &policy_path, &vector_path);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(File::create(dir.join(STDOUT_FILE))?))
            .stderr(Stdio::from(File::create(dir.join(STDERR_FILE))?));

        info!(
            target: event_names::SOLVER_STARTED,
            executable = %self.executable.display(),
            property,
            "running model checker"
        );
        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ToolError::SpawnFailed {
            command: self.executable.display().to_string(),
            source,
        })?;
        let status = self.wait(&mut child)?;
        let elapsed = started.elapsed();
        match status.code() {
            Some(0) => {}
            Some(code) => return Err(ToolError::NonZeroExit { code }.into()),
            None => return Err(ToolError::KilledBySignal.into()),
        }

        let policy = parse_policy(&read_result(&policy_path)?)
            .map_err(|reason| malformed(&policy_path, reason))?;
        let values = parse_vector(&read_result(&vector_path)?)
            .map_err(|reason| malformed(&vector_path, reason))?;

        let states = mdp.num_states();
        if values.len() != states {
            return Err(malformed(
                &vector_path,
                format!("{} values for {states} states", values.len()),
            ));
        }
        if let Some(row) = policy.steps.iter().find(|row| row.len() > states) {
            return Err(malformed(
                &policy_path,
                format!("{} columns for {states} states", row.len()),
            ));
        }
        debug!(steps = policy.horizon(), "policy loaded");
        info!(
            target: event_names::SOLVER_FINISHED,
            elapsed_secs = elapsed.as_secs_f64(),
            "model checker finished"
        );

        Ok(SolverOutput {
            policy,
            values,
            elapsed,
        })
    }
}

fn read_result(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| malformed(path, format!("cannot read result: {e}")))
}

fn malformed(path: &Path, reason: String) -> Error {
    Error::MalformedResult {
        path: path.display().to_string(),
        reason,
    }
}

/// Parse an adversary export: one row per time step, last step first.
/// After the metadata columns, cell `j` is the action of iMDP state `j`
/// (`a_<id>`, or empty when the state has no action).
pub fn parse_policy(text: &str) -> std::result::Result<Policy, String> {
    let mut steps = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split(',')
            .skip(POLICY_SKIP_COLUMNS)
            .map(|cell| parse_action(cell.trim()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| format!("row {}: {e}", n + 1))?;
        steps.push(row);
    }
    if steps.is_empty() {
        return Err("no policy rows".to_string());
    }
    steps.reverse();
    Ok(Policy { steps })
}

fn parse_action(cell: &str) -> std::result::Result<Option<ActionId>, String> {
    let cell = cell.trim_matches('"');
    if cell.is_empty() || cell == "-1" {
        return Ok(None);
    }
    cell.strip_prefix("a_")
        .and_then(|id| id.parse().ok())
        .map(Some)
        .ok_or_else(|| format!("'{cell}' is not an action label"))
}

/// Parse a value vector: metadata rows, then one value per iMDP state.
pub fn parse_vector(text: &str) -> std::result::Result<Vec<f64>, String> {
    text.lines()
        .skip(VECTOR_SKIP_ROWS)
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, l)| {
            l.trim()
                .parse::<f64>()
                .map_err(|e| format!("value {i}: '{}': {e}", l.trim()))
        })
        .collect()
}
