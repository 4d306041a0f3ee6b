//! Logging setup shared by the Fanpost binaries
//!
//! Logs always go to stderr so stdout stays clean for reports. The format
//! and level can be chosen on the command line or through
//! `FANPOST_LOG_FORMAT` / `FANPOST_LOG_LEVEL`; `RUST_LOG` still wins when set.
//!
//! # Examples
//!
//! ```no_run
//! use libfanpost::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "info", false).init();
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_ENV_VAR: &str = "FANPOST_LOG_FORMAT";
pub const LOG_LEVEL_ENV_VAR: &str = "FANPOST_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain text without colors, for piping
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line colored output for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    /// `verbose` raises the default level to `debug`
    pub fn new(format: LogFormat, level: impl Into<String>, verbose: bool) -> Self {
        Self {
            format,
            level: level.into(),
            verbose,
        }
    }

    /// Settings from `FANPOST_LOG_FORMAT` / `FANPOST_LOG_LEVEL`, defaulting to
    /// text output at `default_level`
    pub fn from_env(default_level: &str, verbose: bool) -> Self {
        let format = std::env::var(LOG_FORMAT_ENV_VAR)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(LogFormat::Text);
        let level =
            std::env::var(LOG_LEVEL_ENV_VAR).unwrap_or_else(|_| default_level.to_string());

        Self::new(format, level, verbose)
    }

    fn filter(&self) -> EnvFilter {
        let level: &str = if self.verbose { "debug" } else { &self.level };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    }

    /// Install the global subscriber
    ///
    /// Call once at program start. A second call is ignored.
    pub fn init(&self) {
        let filter = self.filter();

        let installed = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .flatten_event(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(false)
                .try_init(),
        };

        if installed.is_err() {
            tracing::debug!("Logging already initialized");
        }
    }
}
