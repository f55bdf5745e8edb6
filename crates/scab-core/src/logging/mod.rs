//! Structured logging for the abstraction engine.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for batch experiments
//!
//! # Usage
//!
//! ```ignore
//! use scab_core::logging::{init_logging, LogConfig, LogContext, Stage, event_names};
//!
//! let config = LogConfig::from_env(None, None);
//! init_logging(&config);
//!
//! let ctx = LogContext::new(run_id.as_str());
//! let _span = ctx.for_iteration(0).span(Stage::Sample).entered();
//! tracing::info!(target: event_names::SAMPLE_DRAWN, samples = 3200, "noise pool drawn");
//! ```
//!
//! stdout is reserved for command payloads; all log output goes to stderr.

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Level from the config, refined by `RUST_LOG` directives unless
/// `SCAB_LOG` pins a single level.
fn env_filter(config: &LogConfig) -> EnvFilter {
    let directives = match std::env::var(config::ENV_LOG) {
        Ok(_) => String::new(),
        Err(_) => std::env::var("RUST_LOG").unwrap_or_default(),
    };
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from(config.level).into())
        .parse_lossy(directives)
}

/// Install the global subscriber. Later calls (e.g. from tests) are no-ops.
pub fn init_logging(config: &LogConfig) {
    let output: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Human => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                layer.boxed()
            } else {
                layer.without_time().boxed()
            }
        }
        LogFormat::Jsonl => JsonlLayer::stderr().boxed(),
    };
    let _ = tracing_subscriber::registry()
        .with(output)
        .with(env_filter(config))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Human);
        assert_eq!(config.level, LogLevel::Info);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LogConfig::default().with_level(LogLevel::Off);
        init_logging(&config);
        init_logging(&config);
    }

    #[test]
    fn test_level_from_tracing() {
        assert_eq!(Level::from(tracing::Level::INFO), Level::Info);
        assert_eq!(Level::from(tracing::Level::ERROR), Level::Error);
    }
}
