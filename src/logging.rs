//! Structured logging setup
//!
//! Every event the library emits goes through `tracing` under one of the
//! targets in [`EVENT_TARGETS`], so each kind of event can be switched on or
//! off on its own:
//!
//! | event         | target                             |
//! |---------------|------------------------------------|
//! | `load_file`   | `swagger_validator::load_file`     |
//! | `load_ref`    | `swagger_validator::load_ref`      |
//! | `replace_ref` | `swagger_validator::replace_ref`   |
//! | `decode`      | `swagger_validator::decode`        |
//! | `validate`    | `swagger_validator::validate`      |
//! | `model`       | `swagger_validator::model`         |
//!
//! The library never installs a subscriber itself; the binary calls
//! [`init_logging_with_config`].

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Event names and their tracing targets
pub const EVENT_TARGETS: [(&str, &str); 6] = [
    ("load_file", "swagger_validator::load_file"),
    ("load_ref", "swagger_validator::load_ref"),
    ("replace_ref", "swagger_validator::replace_ref"),
    ("decode", "swagger_validator::decode"),
    ("validate", "swagger_validator::validate"),
    ("model", "swagger_validator::model"),
];

/// Log format: JSON for machines, pretty-print for people
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level: trace/debug/info/warn/error
    pub log_level: String,
    /// Log format: json/pretty
    pub format: LogFormat,
    /// Event names to keep; `None` keeps all of them
    pub events: Option<Vec<String>>,
    /// Write through a non-blocking background worker
    pub async_logging: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            format: LogFormat::Pretty,
            events: None,
            async_logging: false,
        }
    }
}

impl LogConfig {
    /// Parse configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_level: env::var("SWAGGER_VALIDATOR_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: env::var("SWAGGER_VALIDATOR_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            events: env::var("SWAGGER_VALIDATOR_LOG_EVENTS").ok().map(|s| parse_events(&s)),
            async_logging: env::var("SWAGGER_VALIDATOR_LOG_ASYNC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.async_logging),
        }
    }

    /// Filter directives for the configured level and event selection
    pub fn directives(&self) -> Vec<String> {
        let level = match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        };

        let mut directives = vec![level.as_str().to_lowercase()];
        if let Some(events) = &self.events {
            for (name, target) in EVENT_TARGETS {
                if !events.iter().any(|e| e == name) {
                    directives.push(format!("{}=off", target));
                }
            }
        }
        directives
    }
}

fn parse_events(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Install the global subscriber
///
/// Output goes to stderr so the CLI's own stdout stays machine-readable. With
/// `async_logging` the returned guard must be held until exit so buffered
/// events are flushed.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let mut env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(""));
    for directive in config.directives() {
        match directive.parse() {
            Ok(directive) => env_filter = env_filter.add_directive(directive),
            Err(_) => eprintln!("Warning: Invalid log filter directive: {}", directive),
        }
    }

    let (writer, guard) = if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(writer), Some(guard))
    } else {
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stderr), None)
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}
