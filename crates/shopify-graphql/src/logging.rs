//! Structured logging setup and redaction of sensitive request fields.

use thiserror::Error;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Fields redacted from logged request bodies by default.
pub const DEFAULT_REDACT_FIELDS: &[&str] = &[
    "password",
    "api_key",
    "secret",
    "token",
    "authorization",
];

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter (e.g., "info", "debug", "shopify_graphql=trace").
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Set the log level.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Enable or disable JSON logs.
    #[must_use]
    pub const fn with_json(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }
}

/// Logging initialization error.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The level directive could not be parsed.
    #[error("invalid log filter `{directive}`: {message}")]
    Filter {
        /// Rejected directive.
        directive: String,
        /// Parser message.
        message: String,
    },

    /// A global subscriber was already installed.
    #[error("logging initialization failed: {0}")]
    Init(String),
}

/// Install a global `tracing` subscriber.
///
/// A non-empty `RUST_LOG` takes precedence over [`LogConfig::level`].
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = level_filter(&config.level, env.as_deref())?;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|err| LoggingError::Init(err.to_string()))
}

fn level_filter(level: &str, env: Option<&str>) -> Result<EnvFilter, LoggingError> {
    let directive = env.filter(|value| !value.trim().is_empty()).unwrap_or(level);
    EnvFilter::try_new(directive).map_err(|err| LoggingError::Filter {
        directive: directive.to_string(),
        message: err.to_string(),
    })
}

/// Redact object fields whose name contains any of `fields` (case-insensitive).
#[must_use]
pub fn redact_sensitive(value: &serde_json::Value, fields: &[&str]) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (key, val) in map {
                let lowered = key.to_lowercase();
                if fields.iter().any(|f| lowered.contains(&f.to_lowercase())) {
                    result.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    result.insert(key.clone(), redact_sensitive(val, fields));
                }
            }
            serde_json::Value::Object(result)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(|v| redact_sensitive(v, fields)).collect())
        }
        other => other.clone(),
    }
}
