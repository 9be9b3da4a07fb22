//! Registered component types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// A pluggable unit registered with the capability registry.
///
/// The registry only needs the instance's asynchronous initialization hook;
/// callers that route to a component keep their own typed handle or use the
/// component id (for tool-backed components the id is the tool name).
#[async_trait]
pub trait Component: Send + Sync {
    /// One-time asynchronous initialization. An error leaves the component
    /// registered in the `error` state.
    async fn initialize(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Rolling usage metrics for a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetrics {
    pub usage_count: u64,
    /// Running average latency in milliseconds
    pub average_latency: f64,
    /// Running success ratio in [0, 1]
    pub success_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl Default for ComponentMetrics {
    fn default() -> Self {
        Self {
            usage_count: 0,
            average_latency: 0.0,
            success_rate: 1.0,
            last_used: None,
        }
    }
}

impl ComponentMetrics {
    /// Fold one observation into the running averages.
    pub fn record(&mut self, latency_ms: f64, success: bool) {
        self.usage_count += 1;
        let n = self.usage_count as f64;
        let outcome = if success { 1.0 } else { 0.0 };
        self.average_latency = (self.average_latency * (n - 1.0) + latency_ms) / n;
        self.success_rate = (self.success_rate * (n - 1.0) + outcome) / n;
        self.last_used = Some(Utc::now());
    }
}

/// Declared capabilities, requirements and metrics of a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub capabilities: BTreeSet<String>,
    pub requirements: BTreeSet<String>,
    pub metrics: ComponentMetrics,
}

impl ComponentMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            capabilities: BTreeSet::new(),
            requirements: BTreeSet::new(),
            metrics: ComponentMetrics::default(),
        }
    }

    /// Set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a provided capability.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    /// Declare a required capability.
    pub fn with_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirements.insert(requirement.into());
        self
    }

    /// Seed the expected latency before any usage is recorded.
    pub fn with_average_latency(mut self, latency_ms: f64) -> Self {
        self.metrics.average_latency = latency_ms;
        self
    }

    /// Seed the expected success rate before any usage is recorded.
    pub fn with_success_rate(mut self, rate: f64) -> Self {
        self.metrics.success_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn provides(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn requires(&self, requirement: &str) -> bool {
        self.requirements.contains(requirement)
    }

    /// Whether this component provides something `other` requires.
    pub fn feeds(&self, other: &ComponentMetadata) -> bool {
        self.capabilities
            .iter()
            .any(|cap| other.requirements.contains(cap))
    }
}

/// Lifecycle status of a registered component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Registered, initialization not finished
    Pending,
    /// Initialized successfully
    Ready,
    /// Initialization failed
    Error(String),
}

impl ComponentStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ComponentStatus::Ready)
    }
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentStatus::Pending => write!(f, "pending"),
            ComponentStatus::Ready => write!(f, "ready"),
            ComponentStatus::Error(e) => write!(f, "error: {}", e),
        }
    }
}

/// A registered component: metadata, instance handle and status.
#[derive(Clone)]
pub struct ComponentInstance {
    pub metadata: ComponentMetadata,
    pub instance: Arc<dyn Component>,
    pub status: ComponentStatus,
}

impl std::fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("metadata", &self.metadata)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_running_average() {
        let mut metrics = ComponentMetrics::default();
        metrics.record(100.0, true);
        metrics.record(200.0, false);

        assert_eq!(metrics.usage_count, 2);
        assert_eq!(metrics.average_latency, 150.0);
        assert_eq!(metrics.success_rate, 0.5);
        assert!(metrics.last_used.is_some());
    }

    #[test]
    fn test_seeded_latency_is_replaced_by_first_observation() {
        let mut metadata = ComponentMetadata::new("a").with_average_latency(500.0);
        metadata.metrics.record(40.0, true);
        assert_eq!(metadata.metrics.average_latency, 40.0);
    }

    #[test]
    fn test_feeds() {
        let producer = ComponentMetadata::new("fetch").with_capability("html");
        let consumer = ComponentMetadata::new("parse")
            .with_requirement("html")
            .with_capability("text");

        assert!(producer.feeds(&consumer));
        assert!(!consumer.feeds(&producer));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ComponentStatus::Ready.to_string(), "ready");
        assert_eq!(
            ComponentStatus::Error("boom".to_string()).to_string(),
            "error: boom"
        );
    }
}
