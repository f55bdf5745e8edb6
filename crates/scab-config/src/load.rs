//! File loading for model definitions and settings.
//!
//! The format is picked from the file extension: `.json`, `.toml`,
//! `.yaml`/`.yml`.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::model::{ModelDefinition, NoiseSpec};
use crate::settings::AbstractionSettings;
use crate::validate::{ValidationError, ValidationResult};

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Detect the format from a path's extension.
    pub fn from_path(path: &Path) -> ValidationResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(ConfigFormat::Json),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            other => Err(ValidationError::ParseError(format!(
                "{}: unsupported extension {:?} (expected json, toml, yaml or yml)",
                path.display(),
                other.unwrap_or("")
            ))),
        }
    }

    /// Parse a document in this format.
    pub fn parse<T: DeserializeOwned>(self, content: &str) -> ValidationResult<T> {
        match self {
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ValidationError::ParseError(e.to_string()))
            }
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|e| ValidationError::ParseError(e.to_string()))
            }
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| ValidationError::ParseError(e.to_string())),
        }
    }
}

/// A parsed document together with its origin and raw text (for snapshots).
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub value: T,
    pub path: PathBuf,
    pub raw: String,
    pub format: ConfigFormat,
}

fn read(path: &Path) -> ValidationResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| ValidationError::IoError(format!("{}: {}", path.display(), e)))
}

fn load<T: DeserializeOwned>(path: &Path) -> ValidationResult<Loaded<T>> {
    let format = ConfigFormat::from_path(path)?;
    let raw = read(path)?;
    let value = format
        .parse(&raw)
        .map_err(|e| ValidationError::ParseError(format!("{}: {}", path.display(), e)))?;
    debug!(path = %path.display(), ?format, "config.loaded");
    Ok(Loaded {
        value,
        path: path.to_path_buf(),
        raw,
        format,
    })
}

/// Load a model definition.
///
/// An empirical noise pool given by `path` is read (relative to the model
/// file) and appended to the inline samples, so callers always see the
/// complete pool.
pub fn load_model(path: &Path) -> ValidationResult<Loaded<ModelDefinition>> {
    let mut loaded: Loaded<ModelDefinition> = load(path)?;
    if let NoiseSpec::Empirical {
        samples,
        path: Some(pool),
        ..
    } = &mut loaded.value.noise
    {
        let pool_path = match path.parent() {
            Some(dir) if pool.is_relative() => dir.join(&*pool),
            _ => pool.clone(),
        };
        let mut vectors = load_noise_pool(&pool_path)?;
        debug!(path = %pool_path.display(), count = vectors.len(), "noise_pool.loaded");
        samples.append(&mut vectors);
    }
    Ok(loaded)
}

/// Load abstraction settings.
pub fn load_settings(path: &Path) -> ValidationResult<Loaded<AbstractionSettings>> {
    load(path)
}

/// Read one noise vector per line, comma or whitespace separated.
/// Blank lines and lines starting with `#` are skipped.
pub fn load_noise_pool(path: &Path) -> ValidationResult<Vec<Vec<f64>>> {
    parse_noise_pool(&read(path)?)
        .map_err(|e| ValidationError::ParseError(format!("{}: {}", path.display(), e)))
}

fn parse_noise_pool(content: &str) -> Result<Vec<Vec<f64>>, String> {
    let mut pool = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|tok| !tok.is_empty())
            .map(|tok| tok.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("line {}: {}", lineno + 1, e))?;
        if let Some(first) = pool.first().map(Vec::len) {
            if row.len() != first {
                return Err(format!(
                    "line {}: expected {} values, got {}",
                    lineno + 1,
                    first,
                    row.len()
                ));
            }
        }
        pool.push(row);
    }
    Ok(pool)
}
