//! Scenario Abstraction CLI
//!
//! The main entry point for scab, handling:
//! - Full abstraction runs (sample → intervals → iMDP → solve → validate)
//! - Model and settings checks
//! - Scenario-bound table generation
//! - JSON schema export for model definitions

use clap::{Args, Parser, Subcommand};
use scab_common::{format_error_human, Error, OutputFormat, StructuredError};
use scab_config::{AbstractionSettings, ModelDefinition};
use scab_core::exit_codes::ExitCode;
use scab_core::intervals::bounds::{render_table, table_file_name};
use scab_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use scab_core::partition::RegionKind;
use scab_core::pipeline::{Abstraction, RunOptions, RunSummary};
use scab_core::solver::PolicySolver;
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Scenario-based abstraction of linear stochastic systems into interval MDPs
#[derive(Parser)]
#[command(name = "scab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Output format for the command payload on stdout
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Abstract a model into interval MDPs, optionally solve and validate
    Run(RunArgs),

    /// Load and validate a model and its settings without sampling
    Check(CheckArgs),

    /// Print or write a scenario-bound table
    Bounds(BoundsArgs),

    /// Print the JSON schema of model definitions (or settings)
    Schema(SchemaArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Model definition (.json, .toml, .yaml)
    model: PathBuf,

    /// Abstraction settings file
    #[arg(long, short = 's')]
    settings: Option<PathBuf>,

    /// Override the output root directory
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Run the model checker on every iteration
    #[arg(long)]
    solve: bool,

    /// Simulate the synthesized policy (requires --solve)
    #[arg(long)]
    validate: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Model definition (.json, .toml, .yaml)
    model: PathBuf,

    /// Abstraction settings file
    #[arg(long, short = 's')]
    settings: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BoundsArgs {
    /// Number of noise samples N
    #[arg(long, short = 'n')]
    samples: u64,

    /// Confidence parameter β
    #[arg(long, short = 'b')]
    confidence: f64,

    /// File or directory to write to (stdout when absent)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// File name prefix when --output is a directory
    #[arg(long, default_value = "bounds")]
    prefix: String,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Emit the settings schema instead
    #[arg(long)]
    settings: bool,
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(
        LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet),
        cli.global.log_format,
    );
    init_logging(&log_config);

    let exit_code = match &cli.command {
        Commands::Run(args) => run_abstraction(&cli.global, args),
        Commands::Check(args) => run_check(&cli.global, args),
        Commands::Bounds(args) => run_bounds(&cli.global, args),
        Commands::Schema(args) => run_schema(args),
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_abstraction(global: &GlobalOpts, args: &RunArgs) -> ExitCode {
    if args.validate && !args.solve {
        return output_error(
            global,
            &Error::Config("--validate needs a policy; add --solve".into()),
        );
    }
    let abstraction = match Abstraction::load(&args.model, args.settings.as_deref()) {
        Ok(a) => a,
        Err(e) => return output_error(global, &e),
    };
    let prism = abstraction.prism_solver();
    let solver: Option<&dyn PolicySolver> = if args.solve { Some(&prism) } else { None };
    let options = RunOptions {
        output_root: args.output.clone(),
        validate: args.validate,
    };

    let summary = match abstraction.run(&options, solver) {
        Ok(s) => s,
        Err(e) => return output_error(global, &e),
    };
    output_run_summary(global, &summary);

    let batch = &summary.iterations.summary;
    if batch.all_succeeded {
        ExitCode::Clean
    } else if batch.any_succeeded {
        ExitCode::PartialFail
    } else {
        summary
            .iterations
            .failed
            .first()
            .map_or(ExitCode::InternalError, |f| ExitCode::for_code(f.error.code))
    }
}

fn output_run_summary(global: &GlobalOpts, summary: &RunSummary) {
    let batch = &summary.iterations.summary;
    match global.format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Summary => {
            let status = if batch.all_succeeded { "OK" } else { "FAILED" };
            println!(
                "[{}] run: {} ({}/{} iterations)",
                summary.run_id, status, batch.succeeded, batch.total
            );
        }
        OutputFormat::Human => {
            println!("# scab run {}", summary.run_id);
            println!();
            println!("Model:     {}", summary.config.summary.model_name);
            println!("Output:    {}", summary.directory.display());
            println!(
                "Samples:   {} at confidence {:e}",
                summary.config.summary.samples, summary.config.summary.confidence
            );
            println!();
            for report in &summary.iterations.succeeded {
                println!(
                    "✓ iteration {}: {} states, {} choices, {} transitions ({:.2}s)",
                    report.iteration,
                    report.size.states,
                    report.size.choices,
                    report.size.transitions,
                    report.timings.sample + report.timings.intervals + report.timings.build
                );
                if let Some(value) = report.solver.as_ref().and_then(|s| s.initial_value) {
                    println!("  Guaranteed probability: {value:.4}");
                }
                if let Some(mc) = &report.monte_carlo {
                    println!(
                        "  Empirical: {:.4} in [{:.4}, {:.4}] over {} trials",
                        mc.frequency, mc.interval_low, mc.interval_high, mc.trials
                    );
                }
            }
            for failure in &summary.iterations.failed {
                println!("✗ {}: {}", failure.item_id, failure.error.message);
            }
        }
    }
}

#[derive(Serialize)]
struct CheckReport<'a> {
    status: &'static str,
    model: &'a str,
    state_dim: usize,
    input_dim: usize,
    regions: usize,
    target_regions: usize,
    critical_regions: usize,
    actions: usize,
    samples: u64,
    confidence: f64,
    settings_source: &'a str,
    config_id: &'a str,
}

fn run_check(global: &GlobalOpts, args: &CheckArgs) -> ExitCode {
    let abstraction = match Abstraction::load(&args.model, args.settings.as_deref()) {
        Ok(a) => a,
        Err(e) => return output_error(global, &e),
    };
    let regions = abstraction.partition().regions();
    let count = |kind: RegionKind| regions.iter().filter(|r| r.kind == kind).count();
    let snapshot = abstraction.snapshot();
    let report = CheckReport {
        status: "ok",
        model: &abstraction.model().name,
        state_dim: abstraction.model().state_dim(),
        input_dim: abstraction.model().input_dim(),
        regions: regions.len(),
        target_regions: count(RegionKind::Target),
        critical_regions: count(RegionKind::Critical),
        actions: abstraction.actions().len(),
        samples: abstraction.settings().sampling.samples,
        confidence: abstraction.settings().sampling.confidence,
        settings_source: &snapshot.settings_source,
        config_id: snapshot.short_id(),
    };

    match global.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Summary => println!("[{}] check: OK", report.model),
        OutputFormat::Human => {
            println!("# scab check");
            println!();
            println!("✓ model: {} ({}D, {} inputs)", report.model, report.state_dim, report.input_dim);
            println!(
                "✓ partition: {} regions ({} target, {} critical)",
                report.regions, report.target_regions, report.critical_regions
            );
            println!("✓ actions: {}", report.actions);
            println!(
                "✓ settings: {} samples at confidence {:e} ({})",
                report.samples, report.confidence, report.settings_source
            );
        }
    }
    ExitCode::Clean
}

fn run_bounds(global: &GlobalOpts, args: &BoundsArgs) -> ExitCode {
    if args.samples == 0 {
        return output_error(global, &Error::Config("--samples must be positive".into()));
    }
    if !(args.confidence > 0.0 && args.confidence < 1.0) {
        return output_error(
            global,
            &Error::Config(format!(
                "--confidence must lie in (0, 1), got {}",
                args.confidence
            )),
        );
    }
    let table = render_table(args.samples, args.confidence);

    let Some(output) = &args.output else {
        print!("{table}");
        return ExitCode::Clean;
    };
    let path = table_path(output, &args.prefix, args.samples, args.confidence);
    if let Err(e) = std::fs::write(&path, table) {
        return output_error(global, &Error::Io(e));
    }
    tracing::info!(path = %path.display(), "bound table written");
    if global.format == OutputFormat::Json {
        print_json(&serde_json::json!({
            "status": "ok",
            "path": path.display().to_string(),
            "samples": args.samples,
            "confidence": args.confidence,
        }));
    }
    ExitCode::Clean
}

fn table_path(output: &Path, prefix: &str, samples: u64, confidence: f64) -> PathBuf {
    if output.is_dir() {
        output.join(table_file_name(prefix, samples, confidence))
    } else {
        output.to_path_buf()
    }
}

fn run_schema(args: &SchemaArgs) -> ExitCode {
    let schema = if args.settings {
        schemars::schema_for!(AbstractionSettings)
    } else {
        schemars::schema_for!(ModelDefinition)
    };
    print_json(&schema);
    ExitCode::Clean
}

// ============================================================================
// Output helpers
// ============================================================================

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}

fn output_error(global: &GlobalOpts, err: &Error) -> ExitCode {
    match global.format {
        OutputFormat::Json => println!("{}", StructuredError::from(err).to_json()),
        _ => {
            let color = !global.no_color && std::io::stderr().is_terminal();
            eprintln!("{}", format_error_human(err, color));
        }
    }
    ExitCode::for_error(err)
}
