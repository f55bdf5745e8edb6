//! CLI tests for the scab binary.
//!
//! These run the real binary against the fixtures and check payloads on
//! stdout and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

fn scab() -> Command {
    let mut cmd = Command::cargo_bin("scab").expect("scab binary should exist");
    cmd.env_remove("SCAB_SETTINGS")
        .env_remove("SCAB_CONFIG_DIR")
        .env_remove("SCAB_LOG_FORMAT")
        .env("SCAB_LOG", "warn");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

// ============================================================================
// check
// ============================================================================

mod check {
    use super::*;

    #[test]
    fn valid_model_reports_partition() {
        scab()
            .args(["check", "--settings"])
            .arg(fixture("settings.toml"))
            .arg(fixture("grid4.json"))
            .assert()
            .success()
            .stdout(
                predicate::str::contains("\"regions\": 16")
                    .and(predicate::str::contains("\"model\": \"grid4\"")),
            );
    }

    #[test]
    fn human_format_lists_checks() {
        scab()
            .args(["check", "--format", "human", "--settings"])
            .arg(fixture("settings.toml"))
            .arg(fixture("scalar.yaml"))
            .assert()
            .success()
            .stdout(predicate::str::contains("1 target"));
    }

    #[test]
    fn missing_model_is_an_input_error() {
        scab()
            .args(["check", "--settings"])
            .arg(fixture("settings.toml"))
            .arg(fixture("missing.json"))
            .assert()
            .code(10)
            .stdout(predicate::str::contains("\"code\""));
    }

    #[test]
    fn missing_settings_file_is_an_input_error() {
        scab()
            .args(["check", "--settings", "/nonexistent/settings.toml"])
            .arg(fixture("grid4.json"))
            .assert()
            .code(10);
    }
}

// ============================================================================
// run
// ============================================================================

mod run {
    use super::*;

    #[test]
    fn writes_exchange_files_and_summary() {
        let out = tempfile::tempdir().unwrap();
        scab()
            .args(["run", "--format", "summary", "--settings"])
            .arg(fixture("settings.toml"))
            .arg("--output")
            .arg(out.path())
            .arg(fixture("grid4.json"))
            .assert()
            .success()
            .stdout(predicate::str::contains("run: OK (1/1 iterations)"));

        let runs: Vec<_> = fs::read_dir(out.path()).unwrap().collect();
        assert_eq!(runs.len(), 1);
        let run_dir = runs[0].as_ref().unwrap().path();
        assert!(run_dir.join("summary.json").exists());
        let iteration = run_dir.join("iteration-000");
        for file in ["grid.sta", "grid.lab", "grid.tra", "grid.pctl", "report.json"] {
            assert!(iteration.join(file).exists(), "{file} missing");
        }
    }

    #[test]
    fn validate_without_solve_is_rejected() {
        scab()
            .args(["run", "--validate"])
            .arg(fixture("grid4.json"))
            .assert()
            .code(10);
    }

    #[test]
    fn missing_model_checker_fails_every_iteration() {
        let out = tempfile::tempdir().unwrap();
        let settings = out.path().join("settings.toml");
        fs::write(
            &settings,
            "[sampling]\nsamples = 1000\nconfidence = 1e-6\nseed = 1\n\n\
             [solver]\nprism_path = \"/nonexistent/prism\"\ntimeout_secs = 5\n",
        )
        .unwrap();
        scab()
            .args(["run", "--solve", "--settings"])
            .arg(&settings)
            .arg("--output")
            .arg(out.path().join("runs"))
            .arg(fixture("grid4.json"))
            .assert()
            .code(12)
            .stdout(predicate::str::contains("\"failed\": 1"));
    }
}

// ============================================================================
// bounds / schema
// ============================================================================

mod bounds {
    use super::*;

    #[test]
    fn prints_table_to_stdout() {
        scab()
            .args(["bounds", "--samples", "100", "--confidence", "1e-8"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("k,low,high\n0,"));
    }

    #[test]
    fn writes_named_table_into_directory() {
        let out = tempfile::tempdir().unwrap();
        scab()
            .args(["bounds", "--samples", "50", "--confidence", "0.001", "--output"])
            .arg(out.path())
            .assert()
            .success();
        let table = fs::read_to_string(out.path().join("bounds_N=50_beta=1e-3.csv")).unwrap();
        assert_eq!(table.lines().count(), 52);
    }

    #[test]
    fn rejects_confidence_outside_unit_interval() {
        scab()
            .args(["bounds", "--samples", "100", "--confidence", "1.5"])
            .assert()
            .code(10);
    }
}

#[test]
fn schema_describes_model_definition() {
    scab()
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"partition\"").and(predicate::str::contains("timebound")));
}

#[test]
fn unknown_command_fails() {
    scab()
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}
