//! Scenario abstraction configuration loading and validation.
//!
//! This crate provides:
//! - Typed model definitions (dynamics, noise, partition, reach-avoid property)
//! - Abstraction settings (sampling, confidence, modes, outputs)
//! - File loading for JSON, TOML and YAML
//! - Settings resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - Config snapshots for run reports

pub mod load;
pub mod model;
pub mod resolve;
pub mod settings;
pub mod snapshot;
pub mod validate;

pub use load::{load_model, load_settings, ConfigFormat, Loaded};
pub use model::{
    ActionSpec, AxisRange, DynamicsSpec, EpistemicSpec, ModelDefinition, NoiseSpec,
    PartitionSpec, RegionBox, TimeBound,
};
pub use resolve::{resolve_settings, ConfigSource, SettingsPath};
pub use settings::{
    AbstractionSettings, AbstractionType, MdpMode, MonteCarloSettings, OutputSettings,
    Representative, RoundingSettings, SamplingSettings, SolverSettings,
};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_model, validate_pair, validate_settings, ValidationError, ValidationResult};

/// Schema version for model and settings files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
