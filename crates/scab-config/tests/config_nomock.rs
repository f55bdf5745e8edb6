//! No-mock configuration loading, validation and resolution tests.
//!
//! Covers:
//! - Loading JSON, TOML and YAML fixtures (including an external noise pool)
//! - Semantic validation failures mapped onto the unified error type
//! - Resolution order (CLI > env > config dir > defaults)

use scab_common::Error;
use scab_config::resolve::{resolve_settings, ConfigSource};
use scab_config::{
    load_model, load_settings, validate_model, validate_pair, validate_settings, ConfigFormat,
    ConfigSnapshot, MdpMode, NoiseSpec, ValidationError,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let mut saved = Vec::with_capacity(keys.len());
        for key in keys {
            saved.push(env::var(key).ok());
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (idx, key) in self.keys.iter().enumerate() {
            match self.saved.get(idx).and_then(|v| v.as_ref()) {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("env lock poisoned");
    f()
}

#[test]
fn test_load_json_model_fixture() {
    let loaded = load_model(&fixtures_dir().join("double_integrator.json")).expect("load model");
    assert_eq!(loaded.format, ConfigFormat::Json);
    assert_eq!(loaded.value.name, "double_integrator");
    assert_eq!(loaded.value.timebound.steps(), Some(32));
    validate_model(&loaded.value).expect("fixture should validate");
}

#[test]
fn test_load_toml_model_with_noise_pool() {
    let loaded = load_model(&fixtures_dir().join("building.toml")).expect("load model");
    assert_eq!(loaded.format, ConfigFormat::Toml);
    assert_eq!(loaded.value.timebound.steps(), None);
    match &loaded.value.noise {
        NoiseSpec::Empirical { samples, .. } => {
            assert_eq!(samples.len(), 40);
            assert!(samples.iter().all(|s| s.len() == 1));
        }
        other => panic!("expected empirical noise, got {other:?}"),
    }
    validate_model(&loaded.value).expect("fixture should validate");
}

#[test]
fn test_load_yaml_settings_fixture() {
    let loaded = load_settings(&fixtures_dir().join("settings.yaml")).expect("load settings");
    let settings = loaded.value;
    assert_eq!(settings.sampling.samples, 1000);
    assert_eq!(settings.sampling.seed, Some(42));
    assert_eq!(settings.mdp_mode, MdpMode::Interval);
    assert_eq!(settings.rounding.decimals, 4);
    assert_eq!(settings.output.prefix, "drone");
    // untouched sections keep their defaults
    assert_eq!(settings.sampling.max_nonfinite_fraction, 0.01);
    validate_settings(&settings).expect("fixture should validate");
}

#[test]
fn test_shape_error_maps_to_invalid_model() {
    let loaded = load_model(&fixtures_dir().join("invalid_shape.json")).expect("parses");
    let err = validate_model(&loaded.value).expect_err("b has wrong row count");
    assert!(matches!(err, ValidationError::Shape { .. }));
    let unified: Error = err.into();
    assert_eq!(unified.code(), 11);
}

#[test]
fn test_invalid_settings_rejected() {
    let loaded = load_settings(&fixtures_dir().join("invalid_settings.toml")).expect("parses");
    let err = validate_settings(&loaded.value).expect_err("zero iterations");
    assert!(matches!(err, ValidationError::InvalidValue { .. }));
}

#[test]
fn test_unparseable_file_is_parse_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("model.json");
    fs::write(&path, "{ not json").expect("write");
    assert!(matches!(load_model(&path), Err(ValidationError::ParseError(_))));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = load_model(Path::new("/definitely/not/here.json")).expect_err("missing");
    assert!(matches!(err, ValidationError::IoError(_)));
}

#[test]
fn test_validate_pair_with_fixtures() {
    let model = load_model(&fixtures_dir().join("double_integrator.json")).expect("model");
    let settings = load_settings(&fixtures_dir().join("settings.yaml")).expect("settings");
    validate_pair(&model.value, &settings.value).expect("pair should validate");

    let snapshot = ConfigSnapshot::new(
        &model.value,
        &model.raw,
        Some(&model.path),
        &settings.value,
        Some(&settings.raw),
        &Default::default(),
    );
    assert_eq!(snapshot.summary.samples, 1000);
    assert!(snapshot.settings_hash.is_some());
}

#[test]
fn test_resolution_prefers_cli_over_env() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&["SCAB_SETTINGS", "SCAB_CONFIG_DIR"]);
        let dir = TempDir::new().expect("tempdir");
        let cli = dir.path().join("cli.toml");
        let from_env = dir.path().join("env.toml");
        fs::write(&cli, "iterations = 1").expect("write");
        fs::write(&from_env, "iterations = 2").expect("write");
        env::set_var("SCAB_SETTINGS", &from_env);

        let resolved = resolve_settings(Some(&cli));
        assert_eq!(resolved.source, ConfigSource::CliArgument);
        assert_eq!(resolved.path.as_deref(), Some(cli.as_path()));

        let resolved = resolve_settings(None);
        assert_eq!(resolved.source, ConfigSource::Environment);
        assert_eq!(resolved.path.as_deref(), Some(from_env.as_path()));
    });
}

#[test]
fn test_resolution_uses_config_dir() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&["SCAB_SETTINGS", "SCAB_CONFIG_DIR"]);
        env::remove_var("SCAB_SETTINGS");
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("settings.toml"), "iterations = 3").expect("write");
        env::set_var("SCAB_CONFIG_DIR", dir.path());

        let resolved = resolve_settings(Some(Path::new("/missing/cli.toml")));
        assert_eq!(resolved.source, ConfigSource::Environment);
        let loaded = load_settings(resolved.path.as_deref().expect("path")).expect("load");
        assert_eq!(loaded.value.iterations, 3);
    });
}
