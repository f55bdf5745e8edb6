//! Logging configuration.
//!
//! Precedence, lowest first: built-in defaults, `RUST_LOG`, `SCAB_LOG`,
//! `SCAB_LOG_FORMAT`, then the CLI (`-v`/`-q`, `--log-format`).

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

pub const ENV_LOG: &str = "SCAB_LOG";
pub const ENV_LOG_FORMAT: &str = "SCAB_LOG_FORMAT";

/// Log output format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Console lines for interactive runs.
    #[default]
    #[value(alias = "console", alias = "pretty")]
    Human,
    /// One JSON object per event, for batch experiments.
    #[value(alias = "json")]
    Jsonl,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(s.trim(), true).ok()
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        })
    }
}

/// Log level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    const NAMES: [(&'static str, LogLevel); 9] = [
        ("trace", LogLevel::Trace),
        ("debug", LogLevel::Debug),
        ("info", LogLevel::Info),
        ("warn", LogLevel::Warn),
        ("warning", LogLevel::Warn),
        ("error", LogLevel::Error),
        ("off", LogLevel::Off),
        ("none", LogLevel::Off),
        ("quiet", LogLevel::Off),
    ];

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, level)| *level)
    }

    /// Level for a `-v` count (1 = debug, 2+ = trace) or `-q`.
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Option<Self> {
        match (quiet, verbose) {
            (true, _) => Some(LogLevel::Error),
            (false, 0) => None,
            (false, 1) => Some(LogLevel::Debug),
            (false, _) => Some(LogLevel::Trace),
        }
    }

    /// Most verbose level named anywhere in a `RUST_LOG` directive list,
    /// e.g. `scab_core=debug,rayon=warn` gives debug.
    fn from_directives(directives: &str) -> Option<Self> {
        directives
            .split(',')
            .filter_map(|d| Self::parse(d.rsplit('=').next().unwrap_or(d)))
            .min()
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = Self::NAMES
            .iter()
            .find(|(_, level)| level == self)
            .map_or("info", |(name, _)| name);
        f.write_str(name)
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Timestamps on human lines; JSONL events always carry one.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Resolve from the process environment plus CLI overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::resolve(|key| std::env::var(key).ok(), cli_level, cli_format)
    }

    fn resolve(
        env: impl Fn(&str) -> Option<String>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let env_level = match env(ENV_LOG) {
            Some(v) => LogLevel::parse(&v),
            None => env("RUST_LOG").and_then(|v| LogLevel::from_directives(&v)),
        };
        let env_format = env(ENV_LOG_FORMAT).and_then(|v| LogFormat::parse(&v));
        let defaults = LogConfig::default();
        LogConfig {
            level: cli_level.or(env_level).unwrap_or(defaults.level),
            format: cli_format.or(env_format).unwrap_or(defaults.format),
            timestamps: defaults.timestamps,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(vars: &[(&str, &str)], level: Option<LogLevel>, format: Option<LogFormat>) -> LogConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogConfig::resolve(|k| vars.get(k).cloned(), level, format)
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Jsonl));
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Human));
        assert_eq!(LogFormat::parse("xml"), None);
        assert_eq!(LogLevel::parse("Warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("quiet"), Some(LogLevel::Off));
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }

    #[test]
    fn verbosity_flags() {
        assert_eq!(LogLevel::from_verbosity(0, false), None);
        assert_eq!(LogLevel::from_verbosity(1, false), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_verbosity(3, false), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_verbosity(2, true), Some(LogLevel::Error));
    }

    #[test]
    fn scab_log_wins_over_rust_log() {
        let c = resolve(&[("RUST_LOG", "debug"), ("SCAB_LOG", "error")], None, None);
        assert_eq!(c.level, LogLevel::Error);
        let c = resolve(&[("RUST_LOG", "scab_core=trace,rayon=warn")], None, None);
        assert_eq!(c.level, LogLevel::Trace);
    }

    #[test]
    fn cli_overrides_environment() {
        let c = resolve(
            &[("SCAB_LOG", "error"), ("SCAB_LOG_FORMAT", "jsonl")],
            Some(LogLevel::Debug),
            Some(LogFormat::Human),
        );
        assert_eq!(c.level, LogLevel::Debug);
        assert_eq!(c.format, LogFormat::Human);
        assert_eq!(resolve(&[("SCAB_LOG_FORMAT", "json")], None, None).format, LogFormat::Jsonl);
        assert_eq!(resolve(&[], None, None), LogConfig::default());
    }
}
