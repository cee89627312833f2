//! Log subscriber setup
//!
//! Logs go to stderr; stdout is reserved for command output.
//! `RUST_LOG` overrides the configured level.

use std::io;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use super::{ObservabilityError, ObservabilityResult};

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human-readable single line
    #[default]
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive, e.g. `info` or `fieldseal=debug`
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl LogConfig {
    /// Builds the filter, preferring `RUST_LOG` when set
    pub fn env_filter(&self) -> ObservabilityResult<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level).map_err(|e| {
                ObservabilityError::new(format!("invalid log level '{}': {}", self.level, e))
            }),
        }
    }
}

/// Installs the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> ObservabilityResult<()> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);

    let result = match config.format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };

    result.map_err(|e| ObservabilityError::new(format!("failed to install logger: {}", e)))
}
