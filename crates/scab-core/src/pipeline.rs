//! End-to-end abstraction runs.
//!
//! A run owns the folder `<output root>/<run id>/` with one sub-folder per
//! iteration. Iterations are independent: a failed iteration keeps whatever
//! artifacts it wrote, is recorded in `summary.json`, and the next one
//! starts from scratch.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use scab_common::{BatchResult, Error, IterationId, Result, RunId};
use scab_config::{
    load_model, load_settings, resolve_settings, validate_pair, AbstractionSettings,
    AbstractionType, ConfigSnapshot, ModelDefinition, SettingsPath, SolverSettings,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::dynamics::{actions_from_spec, Action, EpistemicBounds, LinearDynamics};
use crate::imdp::{write_exchange, ExchangeFiles, ImdpBuilder, ImdpSize};
use crate::intervals::{
    check_sample_budget, BoundLookup, CalculatorConfig, IntervalCalculator, LayeredBounds,
    ScenarioBounds, StateActionDistribution, TabulatedBounds,
};
use crate::logging::{event_names, LogContext, Stage};
use crate::montecarlo::{MonteCarloConfig, MonteCarloReport, MonteCarloValidator};
use crate::noise::{cluster, NoiseDistribution, NoiseSample, NoiseSampler};
use crate::partition::Partition;
use crate::solver::{PolicySolver, PrismSolver};

pub const REPORT_FILE: &str = "report.json";
pub const SUMMARY_FILE: &str = "summary.json";

/// Per-invocation switches that are not part of the settings file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overrides `output.root`.
    pub output_root: Option<PathBuf>,
    /// Simulate the synthesized policy even when `monte_carlo.enabled` is off.
    pub validate: bool,
}

/// Wall-clock seconds spent per stage of one iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageTimings {
    pub sample: f64,
    pub intervals: f64,
    pub build: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solve: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate: Option<f64>,
}

/// Interval width statistics over every transition of the iMDP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WidthStats {
    pub mean: f64,
    pub max: f64,
}

impl WidthStats {
    fn of<'a>(distributions: impl Iterator<Item = &'a StateActionDistribution>) -> Self {
        let (mut sum, mut max, mut n) = (0.0_f64, 0.0_f64, 0_u64);
        for dist in distributions {
            for (_, interval) in &dist.successors {
                let w = interval.width();
                sum += w;
                max = max.max(w);
                n += 1;
            }
        }
        Self {
            mean: if n == 0 { 0.0 } else { sum / n as f64 },
            max,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SolverReport {
    pub elapsed: f64,
    pub horizon: usize,
    /// Guaranteed satisfaction probability of the initial region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<f64>,
}

/// Contents of one iteration's `report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct IterationReport {
    pub iteration: IterationId,
    pub directory: PathBuf,
    pub samples: u64,
    pub clusters: usize,
    pub excluded_samples: u64,
    pub size: ImdpSize,
    pub widths: WidthStats,
    pub files: ExchangeFiles,
    pub timings: StageTimings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver: Option<SolverReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monte_carlo: Option<MonteCarloReport>,
}

/// Contents of the run-level `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub directory: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config: ConfigSnapshot,
    pub iterations: BatchResult<IterationReport>,
}

/// A validated model together with everything derived from it once per run.
pub struct Abstraction {
    model: ModelDefinition,
    settings: AbstractionSettings,
    snapshot: ConfigSnapshot,
    partition: Partition,
    dynamics: LinearDynamics,
    actions: Vec<Action>,
    noise: NoiseDistribution,
    epistemic: Option<EpistemicBounds>,
    bounds: Box<dyn BoundLookup>,
}

impl Abstraction {
    /// Load a model file and the settings resolved from `settings_path`,
    /// the environment or the XDG config directory.
    pub fn load(model_path: &Path, settings_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = settings_path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "settings file {} does not exist",
                    path.display()
                )));
            }
        }
        let model = load_model(model_path)?;
        info!(
            target: event_names::CONFIG_LOADED,
            path = %model.path.display(),
            model = %model.value.name,
            "model loaded"
        );

        let resolved = resolve_settings(settings_path);
        let (settings, settings_raw) = match &resolved.path {
            Some(path) => {
                let loaded = load_settings(path)?;
                info!(
                    target: event_names::CONFIG_LOADED,
                    path = %path.display(),
                    source = %resolved.source,
                    "settings loaded"
                );
                (loaded.value, Some(loaded.raw))
            }
            None => {
                info!(target: event_names::CONFIG_DEFAULT_USED, "using built-in settings");
                (AbstractionSettings::default(), None)
            }
        };

        let snapshot = ConfigSnapshot::new(
            &model.value,
            &model.raw,
            Some(&model.path),
            &settings,
            settings_raw.as_deref(),
            &resolved,
        );
        Self::from_parts(model.value, settings, snapshot)
    }

    /// Build from in-memory definitions.
    pub fn new(model: ModelDefinition, settings: AbstractionSettings) -> Result<Self> {
        let model_raw = serde_json::to_string(&model)?;
        let settings_raw = serde_json::to_string(&settings)?;
        let snapshot = ConfigSnapshot::new(
            &model,
            &model_raw,
            None,
            &settings,
            Some(&settings_raw),
            &SettingsPath::default(),
        );
        Self::from_parts(model, settings, snapshot)
    }

    fn from_parts(
        model: ModelDefinition,
        settings: AbstractionSettings,
        snapshot: ConfigSnapshot,
    ) -> Result<Self> {
        validate_pair(&model, &settings)?;
        let sampling = &settings.sampling;
        check_sample_budget(sampling.samples, sampling.confidence)?;

        let mut partition = Partition::from_spec(&model.partition)?;
        partition.label(&model.goal, &model.critical);
        let dynamics = LinearDynamics::from_model(&model)?;
        let actions = actions_from_spec(&model.actions)?;
        if let Some(bad) = actions.iter().find(|a| a.input.len() != dynamics.input_dim()) {
            return Err(Error::InvalidModel(format!(
                "action {} has {} inputs, B has {} columns",
                bad.id,
                bad.input.len(),
                dynamics.input_dim()
            )));
        }
        let noise = NoiseDistribution::from_spec(&model.noise, dynamics.state_dim())?;
        let epistemic = match (settings.abstraction_type, &model.epistemic) {
            (AbstractionType::Epistemic, Some(spec)) => Some(EpistemicBounds::from_spec(
                spec,
                dynamics.state_dim(),
                dynamics.input_dim(),
            )?),
            _ => None,
        };

        let direct = ScenarioBounds::new(sampling.samples, sampling.confidence);
        let bounds: Box<dyn BoundLookup> = match &settings.bound_table {
            Some(path) => Box::new(LayeredBounds::new(
                TabulatedBounds::load(path, sampling.samples)?,
                direct,
            )),
            None => Box::new(direct),
        };

        Ok(Self {
            model,
            settings,
            snapshot,
            partition,
            dynamics,
            actions,
            noise,
            epistemic,
            bounds,
        })
    }

    pub fn model(&self) -> &ModelDefinition {
        &self.model
    }

    pub fn settings(&self) -> &AbstractionSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// PRISM configured from the settings, or with defaults when the
    /// settings have no `solver` section.
    pub fn prism_solver(&self) -> PrismSolver {
        match &self.settings.solver {
            Some(s) => PrismSolver::from_settings(s),
            None => PrismSolver::from_settings(&SolverSettings::default()),
        }
    }

    fn validation_state(&self) -> Option<&[f64]> {
        self.settings
            .monte_carlo
            .initial_state
            .as_deref()
            .or(self.model.initial_state.as_deref())
    }

    /// Run every configured iteration.
    ///
    /// Only errors that prevent the run folder from existing are returned;
    /// iteration failures land in the summary.
    pub fn run(&self, options: &RunOptions, solver: Option<&dyn PolicySolver>) -> Result<RunSummary> {
        let validate = options.validate || self.settings.monte_carlo.enabled;
        let validation_state = if validate {
            if solver.is_none() {
                return Err(Error::Config(
                    "Monte Carlo validation needs a synthesized policy; enable the solver".into(),
                ));
            }
            Some(self.validation_state().ok_or_else(|| {
                Error::Config(
                    "Monte Carlo validation needs initial_state in the model or settings".into(),
                )
            })?)
        } else {
            None
        };

        let run_id = RunId::new();
        let root = options
            .output_root
            .clone()
            .unwrap_or_else(|| self.settings.output.root.clone());
        let run_dir = root.join(run_id.as_str());
        fs::create_dir_all(&run_dir)?;

        let ctx = LogContext::new(run_id.as_str());
        let started_at = Utc::now();
        info!(
            target: event_names::RUN_STARTED,
            run_id = %run_id,
            model = %self.model.name,
            regions = self.partition.len(),
            actions = self.actions.len(),
            iterations = self.settings.iterations,
            directory = %run_dir.display(),
            "abstraction run started"
        );

        let mut pool: Option<Vec<NoiseSample>> = None;
        let mut iterations = BatchResult::default();
        for i in 0..self.settings.iterations {
            let id = IterationId(i);
            let ctx = ctx.for_iteration(i);
            let _span = ctx.span(Stage::Init).entered();
            info!(target: event_names::ITERATION_STARTED, iteration = i, "iteration started");
            match self.iteration(&ctx, &run_dir, id, &mut pool, solver, validation_state) {
                Ok(report) => {
                    info!(
                        target: event_names::ITERATION_FINISHED,
                        iteration = i,
                        states = report.size.states,
                        transitions = report.size.transitions,
                        "iteration finished"
                    );
                    iterations.add_success(report);
                }
                Err(err) => {
                    warn!(
                        target: event_names::ITERATION_FAILED,
                        iteration = i,
                        code = err.code(),
                        error = %err,
                        "iteration failed"
                    );
                    iterations.add_failure(id.dir_name(), &err);
                }
            }
        }

        let summary = RunSummary {
            run_id,
            directory: run_dir,
            started_at,
            finished_at: Utc::now(),
            config: self.snapshot.clone(),
            iterations,
        };
        let _span = ctx.span(Stage::Report).entered();
        fs::write(
            summary.directory.join(SUMMARY_FILE),
            serde_json::to_string_pretty(&summary)?,
        )?;
        info!(
            target: event_names::RUN_FINISHED,
            succeeded = summary.iterations.summary.succeeded,
            failed = summary.iterations.summary.failed,
            "abstraction run finished"
        );
        Ok(summary)
    }

    fn samples_for(
        &self,
        id: IterationId,
        pool: &mut Option<Vec<NoiseSample>>,
    ) -> Result<Vec<NoiseSample>> {
        let sampling = &self.settings.sampling;
        if sampling.reuse_pool {
            if let Some(shared) = pool.as_ref() {
                info!(
                    target: event_names::SAMPLE_REUSED,
                    samples = shared.len(),
                    "reusing noise pool"
                );
                return Ok(shared.clone());
            }
        }
        let seed = sampling.seed.map(|s| s.wrapping_add(u64::from(id.0)));
        let mut sampler = NoiseSampler::new(self.noise.clone(), seed);
        let drawn = sampler.sample(sampling.samples)?;
        info!(
            target: event_names::SAMPLE_DRAWN,
            samples = drawn.len(),
            seed = ?seed,
            "noise pool drawn"
        );
        if sampling.reuse_pool {
            *pool = Some(drawn.clone());
        }
        Ok(drawn)
    }

    fn iteration(
        &self,
        ctx: &LogContext,
        run_dir: &Path,
        id: IterationId,
        pool: &mut Option<Vec<NoiseSample>>,
        solver: Option<&dyn PolicySolver>,
        validation_state: Option<&[f64]>,
    ) -> Result<IterationReport> {
        let dir = run_dir.join(id.dir_name());
        fs::create_dir_all(&dir)?;
        let mut timings = StageTimings::default();

        let clock = Instant::now();
        let clusters = {
            let _span = ctx.span(Stage::Sample).entered();
            let samples = self.samples_for(id, pool)?;
            let clusters = cluster(&samples, self.settings.sampling.cluster_radius);
            info!(
                target: event_names::SAMPLE_CLUSTERED,
                samples = samples.len(),
                clusters = clusters.len(),
                radius = self.settings.sampling.cluster_radius,
                "samples clustered"
            );
            clusters
        };
        timings.sample = clock.elapsed().as_secs_f64();

        let clock = Instant::now();
        let distributions = {
            let _span = ctx.span(Stage::Intervals).entered();
            let mut calculator = IntervalCalculator::new(
                &self.dynamics,
                &self.partition,
                self.bounds.as_ref(),
                CalculatorConfig::from_settings(&self.settings),
            );
            if let Some(epistemic) = &self.epistemic {
                calculator = calculator.with_epistemic(epistemic);
            }
            info!(
                target: event_names::INTERVALS_STARTED,
                pairs = self.partition.len() * self.actions.len(),
                "computing transition intervals"
            );
            let distributions = calculator.compute_all(&self.actions, &clusters)?;
            info!(
                target: event_names::INTERVALS_FINISHED,
                distributions = distributions.len(),
                "transition intervals computed"
            );
            distributions
        };
        timings.intervals = clock.elapsed().as_secs_f64();

        let horizon = self.model.timebound.steps();
        let clock = Instant::now();
        let (mdp, files) = {
            let _span = ctx.span(Stage::Build).entered();
            let mdp = ImdpBuilder::new(&self.partition, &self.actions)
                .mode(self.settings.mdp_mode)
                .initial_state(self.model.initial_state.as_deref())
                .build(&distributions)?;
            let size = mdp.size();
            info!(
                target: event_names::IMDP_BUILT,
                states = size.states,
                choices = size.choices,
                transitions = size.transitions,
                "iMDP built"
            );
            let files = write_exchange(&mdp, &dir, &self.settings.output.prefix, horizon)?;
            info!(
                target: event_names::IMDP_WRITTEN,
                path = %files.tra.display(),
                "exchange files written"
            );
            (mdp, files)
        };
        timings.build = clock.elapsed().as_secs_f64();

        let mut report = IterationReport {
            iteration: id,
            directory: dir.clone(),
            samples: clusters.iter().map(|c| c.weight).sum(),
            clusters: clusters.len(),
            excluded_samples: distributions.values().map(|d| d.excluded).sum(),
            size: mdp.size(),
            widths: WidthStats::of(distributions.values()),
            files,
            timings,
            solver: None,
            monte_carlo: None,
        };

        if let Some(solver) = solver {
            let clock = Instant::now();
            let output = {
                let _span = ctx.span(Stage::Solve).entered();
                solver.solve(&mdp, &report.files)?
            };
            report.timings.solve = Some(clock.elapsed().as_secs_f64());

            let initial_region = self
                .model
                .initial_state
                .as_deref()
                .or(validation_state)
                .and_then(|x| self.partition.locate(x));
            let initial_value = initial_region.and_then(|r| output.region_value(r));
            report.solver = Some(SolverReport {
                elapsed: output.elapsed.as_secs_f64(),
                horizon: output.policy.horizon(),
                initial_value,
            });

            if let Some(x0) = validation_state {
                let clock = Instant::now();
                let _span = ctx.span(Stage::Validate).entered();
                let mc = &self.settings.monte_carlo;
                let config = MonteCarloConfig {
                    trials: mc.trials,
                    confidence: mc.confidence,
                    horizon: horizon.unwrap_or(mc.max_steps),
                    seed: mc.seed,
                };
                info!(
                    target: event_names::VALIDATE_STARTED,
                    trials = config.trials,
                    horizon = config.horizon,
                    "Monte Carlo validation started"
                );
                let analytical = self.partition.locate(x0).and_then(|r| output.region_value(r));
                let validator = MonteCarloValidator::new(
                    &self.dynamics,
                    &self.partition,
                    &self.actions,
                    &self.noise,
                    &output.policy,
                );
                let mc_report = validator.validate(x0, &config, analytical)?;
                info!(
                    target: event_names::VALIDATE_FINISHED,
                    successes = mc_report.successes,
                    frequency = mc_report.frequency,
                    low = mc_report.interval_low,
                    high = mc_report.interval_high,
                    analytical = ?mc_report.analytical,
                    "Monte Carlo validation finished"
                );
                report.monte_carlo = Some(mc_report);
                report.timings.validate = Some(clock.elapsed().as_secs_f64());
            }
        }

        fs::write(dir.join(REPORT_FILE), serde_json::to_string_pretty(&report)?)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imdp::IntervalMdp;
    use crate::solver::{Policy, SolverOutput};
    use scab_config::{ActionSpec, AxisRange, DynamicsSpec, NoiseSpec, PartitionSpec, TimeBound};
    use std::time::Duration;

    fn model() -> ModelDefinition {
        ModelDefinition {
            schema_version: scab_config::CONFIG_SCHEMA_VERSION.to_string(),
            name: "drift".to_string(),
            description: None,
            dynamics: DynamicsSpec {
                a: vec![vec![1.0]],
                b: vec![vec![1.0]],
                q: None,
            },
            noise: NoiseSpec::Empirical {
                source: None,
                samples: vec![vec![-0.1], vec![0.0], vec![0.1]],
                path: None,
            },
            partition: PartitionSpec {
                domain: vec![[0.0, 5.0]],
                number: Some(vec![5]),
                regions: Vec::new(),
            },
            actions: ActionSpec::List {
                inputs: vec![vec![0.0], vec![1.0]],
            },
            goal: vec![vec![AxisRange::Bounds([4.0, 5.0])]],
            critical: Vec::new(),
            timebound: TimeBound::Steps(8),
            epistemic: None,
            initial_state: Some(vec![0.5]),
        }
    }

    fn settings(root: &Path) -> AbstractionSettings {
        let mut s = AbstractionSettings::default();
        s.sampling.samples = 200;
        s.sampling.confidence = 0.01;
        s.sampling.seed = Some(3);
        s.output.root = root.to_path_buf();
        s
    }

    /// Always moves right.
    struct RightSolver;

    impl PolicySolver for RightSolver {
        fn solve(&self, mdp: &IntervalMdp, _files: &ExchangeFiles) -> Result<SolverOutput> {
            let n = mdp.num_states();
            Ok(SolverOutput {
                policy: Policy::stationary(vec![Some(1); n]),
                values: vec![0.9; n],
                elapsed: Duration::from_millis(1),
            })
        }
    }

    struct FailingSolver;

    impl PolicySolver for FailingSolver {
        fn solve(&self, _mdp: &IntervalMdp, _files: &ExchangeFiles) -> Result<SolverOutput> {
            Err(Error::SolverFailed("exit status 1".into()))
        }
    }

    #[test]
    fn writes_iteration_folders_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.iterations = 2;
        let abstraction = Abstraction::new(model(), s).unwrap();
        let summary = abstraction.run(&RunOptions::default(), None).unwrap();

        assert!(summary.iterations.summary.all_succeeded);
        assert_eq!(summary.iterations.succeeded.len(), 2);
        assert!(summary.directory.join(SUMMARY_FILE).exists());
        for report in &summary.iterations.succeeded {
            assert!(report.directory.join(REPORT_FILE).exists());
            assert!(report.files.tra.exists());
            assert_eq!(report.size.states, 6);
            assert_eq!(report.samples, 200);
        }
        assert!(summary.iterations.succeeded[1]
            .directory
            .ends_with("iteration-001"));
    }

    #[test]
    fn solver_and_validation_fill_the_report() {
        let dir = tempfile::tempdir().unwrap();
        let abstraction = Abstraction::new(model(), settings(dir.path())).unwrap();
        let options = RunOptions {
            validate: true,
            ..RunOptions::default()
        };
        let summary = abstraction.run(&options, Some(&RightSolver)).unwrap();
        let report = &summary.iterations.succeeded[0];
        assert_eq!(report.solver.as_ref().and_then(|s| s.initial_value), Some(0.9));
        let mc = report.monte_carlo.as_ref().unwrap();
        assert_eq!(mc.successes, mc.trials);
        assert_eq!(mc.analytical, Some(0.9));
    }

    #[test]
    fn failing_iterations_do_not_block_later_ones() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.iterations = 3;
        let abstraction = Abstraction::new(model(), s).unwrap();
        let summary = abstraction.run(&RunOptions::default(), Some(&FailingSolver)).unwrap();
        assert_eq!(summary.iterations.summary.failed, 3);
        assert!(!summary.iterations.summary.any_succeeded);
        assert_eq!(summary.iterations.failed[2].item_id, "iteration-002");
        assert!(summary.directory.join("iteration-002").join("model.tra").exists());
    }

    #[test]
    fn validation_without_solver_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let abstraction = Abstraction::new(model(), settings(dir.path())).unwrap();
        let options = RunOptions {
            validate: true,
            ..RunOptions::default()
        };
        assert!(matches!(
            abstraction.run(&options, None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn too_few_samples_fail_before_sampling() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.sampling.samples = 10;
        s.sampling.confidence = 1e-8;
        assert!(matches!(
            Abstraction::new(model(), s),
            Err(Error::InsufficientSamples { .. })
        ));
    }

    #[test]
    fn seeded_runs_repeat_and_shared_pools_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.iterations = 2;
        s.sampling.reuse_pool = true;
        s.sampling.cluster_radius = 0.05;
        let abstraction = Abstraction::new(model(), s).unwrap();
        let summary = abstraction.run(&RunOptions::default(), None).unwrap();
        let [a, b] = &summary.iterations.succeeded[..] else {
            panic!("expected two iterations");
        };
        assert_eq!(
            fs::read_to_string(&a.files.tra).unwrap(),
            fs::read_to_string(&b.files.tra).unwrap()
        );
        assert_eq!(a.clusters, b.clusters);
    }
}
