//! # Runtime Configuration
//!
//! Builder-based configuration for the runtime, loadable from environment
//! variables or a TOML document.
//!
//! ## Environment Variables
//!
//! - `CADENCE_RUNTIME_MODE` - `legacy` or `enhanced` (default: enhanced)
//! - `CADENCE_ENABLE_REFLECTION` - Reflect on failed steps (default: true)
//! - `CADENCE_MAX_PLAN_STEPS` - Steps kept from a generated plan (default: 10)
//! - `CADENCE_RETRY_ATTEMPTS` - Re-runs allowed when reflection says retry (default: 1)
//! - `CADENCE_CALL_TIMEOUT` - Deadline per LLM/tool/intelligence call, e.g. `30s` (default: 60s)
//! - `CADENCE_WORKING_MEMORY_LIMIT` - Working memory cap in bytes (default: 52428800 / 50MiB)
//! - `CADENCE_MEMORY_CLEANUP_THRESHOLD` - Utilization that triggers cleanup, 0.0-1.0 (default: 0.8)
//! - `CADENCE_PRUNE_INTERVAL_STEPS` - Steps between context pruning passes (default: 5)
//! - `CADENCE_PLANNING_TOOL` - Tool that produces plans (default: sequential_planning)
//! - `CADENCE_REFLECTION_TOOL` - Tool that critiques steps (default: reflective_analysis)

use serde::Deserialize;
use std::{env, str::FromStr, time::Duration};

use crate::error::ConfigError;

/// Default working memory cap: 50 MiB.
pub const DEFAULT_WORKING_MEMORY_LIMIT: usize = 50 * 1024 * 1024;

/// Selects between plain single-call execution and planned execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RuntimeMode {
    /// Every task is a single execution-engine call
    Legacy,
    /// Multi-step tasks are planned and executed step by step
    #[default]
    Enhanced,
}

impl RuntimeMode {
    pub fn is_enhanced(&self) -> bool {
        matches!(self, RuntimeMode::Enhanced)
    }
}

impl FromStr for RuntimeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(RuntimeMode::Legacy),
            "enhanced" => Ok(RuntimeMode::Enhanced),
            other => Err(ConfigError::InvalidValue {
                key: "mode".to_string(),
                message: format!("expected 'legacy' or 'enhanced', got '{}'", other),
            }),
        }
    }
}

/// Validated runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub mode: RuntimeMode,
    pub enable_reflection: bool,
    pub max_plan_steps: usize,
    pub retry_attempts: u32,
    pub call_timeout: Duration,
    pub working_memory_limit_bytes: usize,
    pub memory_cleanup_threshold: f64,
    pub prune_interval_steps: usize,
    pub planning_tool: String,
    pub reflection_tool: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::Enhanced,
            enable_reflection: true,
            max_plan_steps: 10,
            retry_attempts: 1,
            call_timeout: Duration::from_secs(60),
            working_memory_limit_bytes: DEFAULT_WORKING_MEMORY_LIMIT,
            memory_cleanup_threshold: 0.8,
            prune_interval_steps: 5,
            planning_tool: "sequential_planning".to_string(),
            reflection_tool: "reflective_analysis".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Start a builder from defaults.
    #[must_use]
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::new()
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_plan_steps == 0 {
            return Err(ConfigError::Validation(
                "max_plan_steps must be at least 1".to_string(),
            ));
        }
        if !(self.memory_cleanup_threshold > 0.0 && self.memory_cleanup_threshold <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "memory_cleanup_threshold must be in (0, 1], got {}",
                self.memory_cleanup_threshold
            )));
        }
        if self.working_memory_limit_bytes == 0 {
            return Err(ConfigError::Validation(
                "working_memory_limit_bytes must be greater than zero".to_string(),
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "call_timeout must be greater than zero".to_string(),
            ));
        }
        if self.planning_tool.trim().is_empty() || self.reflection_tool.trim().is_empty() {
            return Err(ConfigError::Validation(
                "planning_tool and reflection_tool must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`RuntimeConfig`] with environment and TOML support.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

/// TOML document shape. Every field is optional and overrides the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    mode: Option<String>,
    enable_reflection: Option<bool>,
    max_plan_steps: Option<usize>,
    retry_attempts: Option<u32>,
    call_timeout: Option<String>,
    working_memory_limit_bytes: Option<usize>,
    memory_cleanup_threshold: Option<f64>,
    prune_interval_steps: Option<usize>,
    planning_tool: Option<String>,
    reflection_tool: Option<String>,
}

impl RuntimeConfigBuilder {
    /// Create a new builder with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::default();

        if let Some(mode) = lookup("CADENCE_RUNTIME_MODE") {
            builder = builder.mode(mode.parse()?);
        }
        if let Some(enabled) = parse_var::<bool>(&lookup, "CADENCE_ENABLE_REFLECTION")? {
            builder = builder.enable_reflection(enabled);
        }
        if let Some(steps) = parse_var::<usize>(&lookup, "CADENCE_MAX_PLAN_STEPS")? {
            builder = builder.max_plan_steps(steps);
        }
        if let Some(attempts) = parse_var::<u32>(&lookup, "CADENCE_RETRY_ATTEMPTS")? {
            builder = builder.retry_attempts(attempts);
        }
        if let Some(raw) = lookup("CADENCE_CALL_TIMEOUT") {
            builder = builder.call_timeout(parse_duration("CADENCE_CALL_TIMEOUT", &raw)?);
        }
        if let Some(limit) = parse_var::<usize>(&lookup, "CADENCE_WORKING_MEMORY_LIMIT")? {
            builder = builder.working_memory_limit_bytes(limit);
        }
        if let Some(threshold) = parse_var::<f64>(&lookup, "CADENCE_MEMORY_CLEANUP_THRESHOLD")? {
            builder = builder.memory_cleanup_threshold(threshold);
        }
        if let Some(interval) = parse_var::<usize>(&lookup, "CADENCE_PRUNE_INTERVAL_STEPS")? {
            builder = builder.prune_interval_steps(interval);
        }
        if let Some(tool) = lookup("CADENCE_PLANNING_TOOL") {
            builder = builder.planning_tool(tool);
        }
        if let Some(tool) = lookup("CADENCE_REFLECTION_TOOL") {
            builder = builder.reflection_tool(tool);
        }

        Ok(builder)
    }

    /// Load configuration from a TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let file: FileConfig =
            toml::from_str(document).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut builder = Self::default();
        if let Some(mode) = file.mode {
            builder = builder.mode(mode.parse()?);
        }
        if let Some(enabled) = file.enable_reflection {
            builder = builder.enable_reflection(enabled);
        }
        if let Some(steps) = file.max_plan_steps {
            builder = builder.max_plan_steps(steps);
        }
        if let Some(attempts) = file.retry_attempts {
            builder = builder.retry_attempts(attempts);
        }
        if let Some(raw) = file.call_timeout {
            builder = builder.call_timeout(parse_duration("call_timeout", &raw)?);
        }
        if let Some(limit) = file.working_memory_limit_bytes {
            builder = builder.working_memory_limit_bytes(limit);
        }
        if let Some(threshold) = file.memory_cleanup_threshold {
            builder = builder.memory_cleanup_threshold(threshold);
        }
        if let Some(interval) = file.prune_interval_steps {
            builder = builder.prune_interval_steps(interval);
        }
        if let Some(tool) = file.planning_tool {
            builder = builder.planning_tool(tool);
        }
        if let Some(tool) = file.reflection_tool {
            builder = builder.reflection_tool(tool);
        }
        Ok(builder)
    }

    #[must_use]
    pub fn mode(mut self, mode: RuntimeMode) -> Self {
        self.config.mode = mode;
        self
    }

    #[must_use]
    pub fn enable_reflection(mut self, enabled: bool) -> Self {
        self.config.enable_reflection = enabled;
        self
    }

    #[must_use]
    pub fn max_plan_steps(mut self, steps: usize) -> Self {
        self.config.max_plan_steps = steps;
        self
    }

    #[must_use]
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    #[must_use]
    pub fn working_memory_limit_bytes(mut self, limit: usize) -> Self {
        self.config.working_memory_limit_bytes = limit;
        self
    }

    #[must_use]
    pub fn memory_cleanup_threshold(mut self, threshold: f64) -> Self {
        self.config.memory_cleanup_threshold = threshold;
        self
    }

    #[must_use]
    pub fn prune_interval_steps(mut self, interval: usize) -> Self {
        self.config.prune_interval_steps = interval;
        self
    }

    #[must_use]
    pub fn planning_tool(mut self, tool: impl Into<String>) -> Self {
        self.config.planning_tool = tool.into();
        self
    }

    #[must_use]
    pub fn reflection_tool(mut self, tool: impl Into<String>) -> Self {
        self.config.reflection_tool = tool.into();
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<RuntimeConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{}': {}", raw, e),
            }),
        None => Ok(None),
    }
}

fn parse_duration(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{}': {}", raw, e),
    })
}
