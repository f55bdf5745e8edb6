//! Settings resolution and path discovery.
//!
//! Resolution order: CLI argument → environment variables → XDG paths →
//! built-in defaults.

use std::path::{Path, PathBuf};

/// Where the settings file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Resolved settings path (None means built-in defaults).
#[derive(Debug, Clone, Default)]
pub struct SettingsPath {
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

const ENV_SETTINGS_PATH: &str = "SCAB_SETTINGS";
const ENV_CONFIG_DIR: &str = "SCAB_CONFIG_DIR";

const SETTINGS_FILENAME: &str = "settings.toml";

/// Application name for XDG directories.
const APP_NAME: &str = "scab";

/// Resolve the settings file.
///
/// 1. Explicit CLI path (if it exists)
/// 2. `SCAB_SETTINGS`
/// 3. `SCAB_CONFIG_DIR` + `settings.toml`
/// 4. XDG config directory (`~/.config/scab/settings.toml`)
/// 5. Built-in defaults (None)
pub fn resolve_settings(cli_path: Option<&Path>) -> SettingsPath {
    if let Some(path) = cli_path {
        if path.exists() {
            return SettingsPath {
                path: Some(path.to_path_buf()),
                source: ConfigSource::CliArgument,
            };
        }
    }

    if let Ok(env_path) = std::env::var(ENV_SETTINGS_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return SettingsPath {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(SETTINGS_FILENAME);
        if path.exists() {
            return SettingsPath {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    if let Some(path) = xdg_config_dir().map(|d| d.join(SETTINGS_FILENAME)) {
        if path.exists() {
            return SettingsPath {
                path: Some(path),
                source: ConfigSource::XdgConfig,
            };
        }
    }

    SettingsPath::default()
}

/// The XDG config directory for scab.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::CliArgument), "CLI argument");
        assert_eq!(
            format!("{}", ConfigSource::Environment),
            "environment variable"
        );
        assert_eq!(format!("{}", ConfigSource::XdgConfig), "XDG config");
        assert_eq!(
            format!("{}", ConfigSource::BuiltinDefault),
            "builtin default"
        );
    }

    #[test]
    fn test_xdg_dir_ends_with_app_name() {
        if let Some(dir) = xdg_config_dir() {
            assert!(dir.ends_with(APP_NAME));
        }
    }
}
