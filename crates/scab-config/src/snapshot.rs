//! Configuration snapshots for run reports and reproducibility.
//!
//! A snapshot captures the exact model and settings a run used, so a run
//! summary can be matched to its inputs later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::ModelDefinition;
use crate::resolve::{ConfigSource, SettingsPath};
use crate::settings::{AbstractionSettings, AbstractionType, MdpMode};

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub timestamp: DateTime<Utc>,

    pub schema_version: String,

    /// SHA-256 of the model file content.
    pub model_hash: String,

    #[serde(default)]
    pub model_path: Option<String>,

    /// SHA-256 of the settings file content (None for defaults).
    #[serde(default)]
    pub settings_hash: Option<String>,

    #[serde(default)]
    pub settings_path: Option<String>,

    pub settings_source: String,

    /// Combined hash of model and settings (for quick comparison).
    pub combined_hash: String,

    pub summary: ConfigSummary,
}

/// Key values for quick reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub model_name: String,
    pub state_dim: usize,
    pub input_dim: usize,
    pub noise_kind: String,
    pub samples: u64,
    pub confidence: f64,
    pub cluster_radius: f64,
    pub mdp_mode: MdpMode,
    pub abstraction_type: AbstractionType,
    pub iterations: u32,
    pub seed: Option<u64>,
}

impl ConfigSnapshot {
    /// Snapshot a loaded model and settings.
    ///
    /// `settings_raw` is None when the settings are built-in defaults.
    pub fn new(
        model: &ModelDefinition,
        model_raw: &str,
        model_path: Option<&std::path::Path>,
        settings: &AbstractionSettings,
        settings_raw: Option<&str>,
        settings_path: &SettingsPath,
    ) -> Self {
        let model_hash = hash_content(model_raw);
        let settings_hash = settings_raw.map(hash_content);
        let combined_hash = hash_content(&format!(
            "{}:{}",
            model_hash,
            settings_hash.as_deref().unwrap_or("defaults")
        ));

        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            model_hash,
            model_path: model_path.map(|p| p.display().to_string()),
            settings_hash,
            settings_path: settings_path.path.as_ref().map(|p| p.display().to_string()),
            settings_source: settings_path.source.to_string(),
            combined_hash,
            summary: ConfigSummary {
                model_name: model.name.clone(),
                state_dim: model.state_dim(),
                input_dim: model.input_dim(),
                noise_kind: model.noise.kind().to_string(),
                samples: settings.sampling.samples,
                confidence: settings.sampling.confidence,
                cluster_radius: settings.sampling.cluster_radius,
                mdp_mode: settings.mdp_mode,
                abstraction_type: settings.abstraction_type,
                iterations: settings.iterations,
                seed: settings.sampling.seed,
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Same model and settings content.
    pub fn matches(&self, other: &ConfigSnapshot) -> bool {
        self.combined_hash == other.combined_hash
    }

    /// First 12 chars of the combined hash.
    pub fn short_id(&self) -> &str {
        &self.combined_hash[..12.min(self.combined_hash.len())]
    }

    pub fn uses_defaults(&self) -> bool {
        self.settings_source == ConfigSource::BuiltinDefault.to_string()
    }
}

/// Hash content with SHA-256 and return hex string.
fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
