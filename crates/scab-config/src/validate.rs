//! Configuration validation errors and semantic validation.

use scab_common::Error;
use thiserror::Error;

use crate::model::{ActionSpec, ModelDefinition, NoiseSpec, PartitionSpec, RegionBox};
use crate::settings::{AbstractionSettings, AbstractionType};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Dimension mismatch for {field}: expected {expected}, got {actual}")]
    Shape {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid partition: {0}")]
    Partition(String),

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 62,
            ValidationError::MissingField(_) => 63,
            ValidationError::InvalidValue { .. } => 64,
            ValidationError::Shape { .. } => 65,
            ValidationError::Partition(_) => 66,
            ValidationError::VersionMismatch { .. } => 67,
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Partition(msg) => Error::InvalidPartition(msg),
            ValidationError::Shape { .. } | ValidationError::MissingField(_) => {
                Error::InvalidModel(err.to_string())
            }
            other => Error::Config(other.to_string()),
        }
    }
}

fn shape(field: impl Into<String>, expected: impl ToString, actual: impl ToString) -> ValidationError {
    ValidationError::Shape {
        field: field.into(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

fn check_version(actual: &str) -> ValidationResult<()> {
    if actual != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

fn check_matrix(field: &str, m: &[Vec<f64>], rows: usize, cols: usize) -> ValidationResult<()> {
    if m.len() != rows {
        return Err(shape(field, format!("{rows} rows"), format!("{} rows", m.len())));
    }
    for (i, row) in m.iter().enumerate() {
        if row.len() != cols {
            return Err(shape(
                format!("{field}[{i}]"),
                format!("{cols} columns"),
                format!("{} columns", row.len()),
            ));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(invalid(format!("{field}[{i}]"), "entries must be finite"));
        }
    }
    Ok(())
}

fn check_vector(field: &str, v: &[f64], len: usize) -> ValidationResult<()> {
    if v.len() != len {
        return Err(shape(field, len, v.len()));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(invalid(field, "entries must be finite"));
    }
    Ok(())
}

/// Validate a model definition semantically.
pub fn validate_model(model: &ModelDefinition) -> ValidationResult<()> {
    check_version(&model.schema_version)?;

    if model.name.trim().is_empty() {
        return Err(ValidationError::MissingField("name".to_string()));
    }

    let n = model.state_dim();
    if n == 0 {
        return Err(ValidationError::MissingField("dynamics.a".to_string()));
    }
    check_matrix("dynamics.a", &model.dynamics.a, n, n)?;

    let p = model.input_dim();
    if p == 0 {
        return Err(ValidationError::MissingField("dynamics.b".to_string()));
    }
    check_matrix("dynamics.b", &model.dynamics.b, n, p)?;

    if let Some(q) = &model.dynamics.q {
        check_vector("dynamics.q", q, n)?;
    }

    validate_noise(&model.noise, n)?;
    validate_partition(&model.partition, n)?;
    validate_actions(&model.actions, p)?;

    for (i, region) in model.goal.iter().enumerate() {
        validate_region_box(&format!("goal[{i}]"), region, n)?;
    }
    for (i, region) in model.critical.iter().enumerate() {
        validate_region_box(&format!("critical[{i}]"), region, n)?;
    }

    if let Some(epistemic) = &model.epistemic {
        check_matrix("epistemic.a_deviation", &epistemic.a_deviation, n, n)?;
        if epistemic.a_deviation.iter().flatten().any(|v| *v < 0.0) {
            return Err(invalid("epistemic.a_deviation", "deviations must be non-negative"));
        }
        if let Some(b_dev) = &epistemic.b_deviation {
            check_matrix("epistemic.b_deviation", b_dev, n, p)?;
            if b_dev.iter().flatten().any(|v| *v < 0.0) {
                return Err(invalid("epistemic.b_deviation", "deviations must be non-negative"));
            }
        }
        if let Some(d) = &epistemic.disturbance {
            check_vector("epistemic.disturbance.lower", &d.lower, n)?;
            check_vector("epistemic.disturbance.upper", &d.upper, n)?;
            if d.lower.iter().zip(&d.upper).any(|(lo, hi)| lo > hi) {
                return Err(invalid(
                    "epistemic.disturbance",
                    "lower must not exceed upper",
                ));
            }
        }
    }

    if let Some(x0) = &model.initial_state {
        check_vector("initial_state", x0, n)?;
    }

    Ok(())
}

fn validate_noise(noise: &NoiseSpec, n: usize) -> ValidationResult<()> {
    match noise {
        NoiseSpec::Gaussian { covariance, mean } => {
            check_matrix("noise.covariance", covariance, n, n)?;
            for i in 0..n {
                if covariance[i][i] <= 0.0 {
                    return Err(invalid(
                        format!("noise.covariance[{i}][{i}]"),
                        "diagonal entries must be positive",
                    ));
                }
                for j in 0..i {
                    if (covariance[i][j] - covariance[j][i]).abs()
                        > 1e-12 * covariance[i][j].abs().max(1.0)
                    {
                        return Err(invalid("noise.covariance", "matrix must be symmetric"));
                    }
                }
            }
            if let Some(mean) = mean {
                check_vector("noise.mean", mean, n)?;
            }
        }
        NoiseSpec::Empirical { samples, path, .. } => {
            if samples.is_empty() && path.is_none() {
                return Err(ValidationError::MissingField(
                    "noise.samples or noise.path".to_string(),
                ));
            }
            for (i, s) in samples.iter().enumerate() {
                check_vector(&format!("noise.samples[{i}]"), s, n)?;
            }
        }
    }
    Ok(())
}

fn validate_partition(partition: &PartitionSpec, n: usize) -> ValidationResult<()> {
    if partition.domain.len() != n {
        return Err(shape("partition.domain", n, partition.domain.len()));
    }
    for (i, [lo, hi]) in partition.domain.iter().enumerate() {
        if !(lo.is_finite() && hi.is_finite()) || hi <= lo {
            return Err(ValidationError::Partition(format!(
                "domain axis {i} must have positive width, got [{lo}, {hi}]"
            )));
        }
    }

    match (&partition.number, partition.regions.is_empty()) {
        (Some(_), false) => Err(ValidationError::Partition(
            "give either partition.number or partition.regions, not both".to_string(),
        )),
        (None, true) => Err(ValidationError::MissingField(
            "partition.number or partition.regions".to_string(),
        )),
        (Some(number), true) => {
            if number.len() != n {
                return Err(shape("partition.number", n, number.len()));
            }
            if number.contains(&0) {
                return Err(ValidationError::Partition(
                    "every axis needs at least one cell".to_string(),
                ));
            }
            Ok(())
        }
        (None, false) => {
            for (i, region) in partition.regions.iter().enumerate() {
                if region.len() != n {
                    return Err(shape(format!("partition.regions[{i}]"), n, region.len()));
                }
                if region.iter().any(|[lo, hi]| hi <= lo) {
                    return Err(ValidationError::Partition(format!(
                        "region {i} must have positive width on every axis"
                    )));
                }
            }
            Ok(())
        }
    }
}

fn validate_actions(actions: &ActionSpec, p: usize) -> ValidationResult<()> {
    match actions {
        ActionSpec::Grid {
            lower,
            upper,
            number,
        } => {
            check_vector("actions.lower", lower, p)?;
            check_vector("actions.upper", upper, p)?;
            if number.len() != p {
                return Err(shape("actions.number", p, number.len()));
            }
            if number.contains(&0) {
                return Err(invalid("actions.number", "every input needs at least one value"));
            }
            if lower.iter().zip(upper).any(|(lo, hi)| lo > hi) {
                return Err(invalid("actions", "lower must not exceed upper"));
            }
        }
        ActionSpec::List { inputs } => {
            if inputs.is_empty() {
                return Err(invalid("actions.inputs", "at least one action is required"));
            }
            for (i, u) in inputs.iter().enumerate() {
                check_vector(&format!("actions.inputs[{i}]"), u, p)?;
            }
        }
    }
    Ok(())
}

fn validate_region_box(field: &str, region: &RegionBox, n: usize) -> ValidationResult<()> {
    if region.len() != n {
        return Err(shape(field, n, region.len()));
    }
    for (axis, range) in region.iter().enumerate() {
        if let crate::model::AxisRange::Bounds([lo, hi]) = range {
            if lo > hi {
                return Err(invalid(
                    format!("{field}[{axis}]"),
                    format!("lower {lo} exceeds upper {hi}"),
                ));
            }
        }
    }
    Ok(())
}

/// Validate abstraction settings semantically.
pub fn validate_settings(settings: &AbstractionSettings) -> ValidationResult<()> {
    check_version(&settings.schema_version)?;

    let sampling = &settings.sampling;
    if sampling.samples == 0 {
        return Err(invalid("sampling.samples", "must be positive"));
    }
    if !(sampling.confidence > 0.0 && sampling.confidence < 1.0) {
        return Err(invalid(
            "sampling.confidence",
            format!("must be in (0, 1), got {}", sampling.confidence),
        ));
    }
    if !(sampling.cluster_radius >= 0.0 && sampling.cluster_radius.is_finite()) {
        return Err(invalid("sampling.cluster_radius", "must be finite and non-negative"));
    }
    if !(0.0..=1.0).contains(&sampling.max_nonfinite_fraction) {
        return Err(invalid("sampling.max_nonfinite_fraction", "must be in [0, 1]"));
    }

    if settings.iterations == 0 {
        return Err(invalid("iterations", "must be at least 1"));
    }

    if settings.rounding.decimals > 15 {
        return Err(invalid("rounding.decimals", "at most 15 decimals are meaningful"));
    }
    if !(0.0..1.0).contains(&settings.rounding.min_probability) {
        return Err(invalid("rounding.min_probability", "must be in [0, 1)"));
    }

    let mc = &settings.monte_carlo;
    if mc.enabled && mc.trials == 0 {
        return Err(invalid("monte_carlo.trials", "must be positive when enabled"));
    }
    if !(mc.confidence > 0.0 && mc.confidence < 1.0) {
        return Err(invalid("monte_carlo.confidence", "must be in (0, 1)"));
    }

    if let Some(solver) = &settings.solver {
        if solver.java_memory_gb == 0 {
            return Err(invalid("solver.java_memory_gb", "must be positive"));
        }
        if solver.timeout_secs == 0 {
            return Err(invalid("solver.timeout_secs", "must be positive"));
        }
    }

    if settings.output.prefix.is_empty()
        || settings.output.prefix.contains(['/', '\\'])
    {
        return Err(invalid("output.prefix", "must be a plain file stem"));
    }

    Ok(())
}

/// Cross-checks between a model and the settings it runs under.
pub fn validate_pair(model: &ModelDefinition, settings: &AbstractionSettings) -> ValidationResult<()> {
    validate_model(model)?;
    validate_settings(settings)?;

    if settings.abstraction_type == AbstractionType::Epistemic && model.epistemic.is_none() {
        return Err(ValidationError::SemanticError(
            "abstraction_type = epistemic requires an `epistemic` section in the model"
                .to_string(),
        ));
    }

    if settings.monte_carlo.enabled {
        let initial = settings
            .monte_carlo
            .initial_state
            .as_ref()
            .or(model.initial_state.as_ref());
        match initial {
            Some(x0) => check_vector("monte_carlo.initial_state", x0, model.state_dim())?,
            None => {
                return Err(ValidationError::MissingField(
                    "initial_state (model) or monte_carlo.initial_state".to_string(),
                ))
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AllKeyword, AxisRange, DynamicsSpec, TimeBound};

    fn model() -> ModelDefinition {
        ModelDefinition {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            name: "integrator".to_string(),
            description: None,
            dynamics: DynamicsSpec {
                a: vec![vec![1.0, 1.0], vec![0.0, 1.0]],
                b: vec![vec![0.5], vec![1.0]],
                q: None,
            },
            noise: NoiseSpec::Gaussian {
                covariance: vec![vec![0.1, 0.0], vec![0.0, 0.1]],
                mean: None,
            },
            partition: PartitionSpec {
                domain: vec![[-4.0, 4.0], [-2.0, 2.0]],
                number: Some(vec![4, 2]),
                regions: Vec::new(),
            },
            actions: ActionSpec::List {
                inputs: vec![vec![-1.0], vec![1.0]],
            },
            goal: vec![vec![AxisRange::Bounds([-1.0, 1.0]), AxisRange::All(AllKeyword::All)]],
            critical: Vec::new(),
            timebound: TimeBound::Steps(8),
            epistemic: None,
            initial_state: Some(vec![3.0, 0.0]),
        }
    }

    #[test]
    fn valid_model_passes() {
        validate_model(&model()).unwrap();
    }

    #[test]
    fn rejects_non_square_a() {
        let mut m = model();
        m.dynamics.a[1].push(0.0);
        assert!(matches!(validate_model(&m), Err(ValidationError::Shape { .. })));
    }

    #[test]
    fn rejects_zero_width_domain() {
        let mut m = model();
        m.partition.domain[0] = [1.0, 1.0];
        let err = validate_model(&m).unwrap_err();
        assert!(matches!(err, ValidationError::Partition(_)));
        assert!(matches!(Error::from(err), Error::InvalidPartition(_)));
    }

    #[test]
    fn rejects_both_partition_styles() {
        let mut m = model();
        m.partition.regions = vec![vec![[-4.0, 4.0], [-2.0, 2.0]]];
        assert!(matches!(validate_model(&m), Err(ValidationError::Partition(_))));
    }

    #[test]
    fn rejects_asymmetric_covariance() {
        let mut m = model();
        m.noise = NoiseSpec::Gaussian {
            covariance: vec![vec![0.1, 0.05], vec![0.0, 0.1]],
            mean: None,
        };
        assert!(matches!(validate_model(&m), Err(ValidationError::InvalidValue { .. })));
    }

    #[test]
    fn default_settings_pass() {
        validate_settings(&AbstractionSettings::default()).unwrap();
    }

    #[test]
    fn rejects_confidence_out_of_range() {
        let mut s = AbstractionSettings::default();
        s.sampling.confidence = 1.0;
        assert!(validate_settings(&s).is_err());
    }

    #[test]
    fn epistemic_type_requires_section() {
        let mut s = AbstractionSettings::default();
        s.abstraction_type = AbstractionType::Epistemic;
        let err = validate_pair(&model(), &s).unwrap_err();
        assert!(matches!(err, ValidationError::SemanticError(_)));
    }

    #[test]
    fn monte_carlo_needs_initial_state() {
        let mut m = model();
        m.initial_state = None;
        let mut s = AbstractionSettings::default();
        s.monte_carlo.enabled = true;
        assert!(matches!(
            validate_pair(&m, &s),
            Err(ValidationError::MissingField(_))
        ));
        s.monte_carlo.initial_state = Some(vec![0.0, 0.0]);
        validate_pair(&m, &s).unwrap();
    }
}
