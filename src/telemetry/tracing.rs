use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::TelemetryConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-line
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Subscriber settings resolved from config and command line.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub directive: String,
    pub format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            directive: "warn".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl From<&TelemetryConfig> for TracingConfig {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            directive: config.log_level.clone(),
            format: if config.json_logs {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
        }
    }
}

impl TracingConfig {
    /// Raise the level by `verbosity` steps (`-v` → info, `-vv` → debug, ...).
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
        if verbosity == 0 {
            return self;
        }
        let base = LEVELS
            .iter()
            .position(|l| self.directive.eq_ignore_ascii_case(l))
            .unwrap_or(1);
        let level = (base + verbosity as usize).min(LEVELS.len() - 1);
        self.directive = LEVELS[level].to_string();
        self
    }
}

/// Install the global subscriber. Logs go to stderr so command output
/// stays parseable.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.directive)
            .with_context(|| format!("invalid log level: {}", config.directive))?,
    };

    let output = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()?;

    debug!(directive = %config.directive, format = ?config.format, "tracing initialized");
    Ok(())
}
