//! Tracing subscriber setup.

use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(TelemetryError::InvalidFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Directive used when `RUST_LOG` is unset or invalid
    pub default_directive: String,
    pub format: LogFormat,
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_directive: "info".to_string(),
            format: LogFormat::Pretty,
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    pub fn json() -> Self {
        Self {
            format: LogFormat::Json,
            ..Self::default()
        }
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,

    #[error("Invalid filter directive: {0}")]
    InvalidDirective(String),

    #[error("Unknown log format '{0}', expected 'pretty' or 'json'")]
    InvalidFormat(String),
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// `AlreadyInitialized` if a global subscriber is already set.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.default_directive)
            .map_err(|e| TelemetryError::InvalidDirective(e.to_string()))?,
    };

    let json = config.format == LogFormat::Json;
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(config.with_target)
    });
    let pretty_layer =
        (!json).then(|| tracing_subscriber::fmt::layer().with_target(config.with_target));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)?;

    tracing::info!(format = ?config.format, "Initialized structured tracing");
    Ok(())
}
