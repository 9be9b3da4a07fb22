//! Runtime data model.
//!
//! Plans, step history records, reflections, insights and the agent
//! configuration the runtime executes on behalf of. All types are plain
//! serializable values; sessions hand out clones, never live references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorKind;
use crate::identifiers::prefixed_id;

/// Tool name a planned step carries when the planner left tool choice open.
pub const TOOL_TBD: &str = "TBD";

/// Tool name signalling that a step (or a model answer) needs no tool.
pub const TOOL_NONE: &str = "none";

// ============================================================================
// Agent configuration
// ============================================================================

/// Model parameters forwarded to the LLM handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Read-only description of the agent a task runs as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique agent identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Optional persona/description used by the system prompt service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Names of the tools this agent may invoke
    #[serde(default)]
    pub tools: Vec<String>,
    /// Model parameters
    #[serde(default)]
    pub model: ModelConfig,
}

impl AgentConfig {
    /// Create an agent with no tools and default model settings.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            tools: Vec::new(),
            model: ModelConfig::default(),
        }
    }

    /// Set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Allow a tool. Duplicates are ignored.
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        let tool = tool.into();
        if !self.tools.contains(&tool) {
            self.tools.push(tool);
        }
        self
    }

    /// Set the model configuration.
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    pub fn allows_tool(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool)
    }
}

// ============================================================================
// Plans
// ============================================================================

/// One step of a linear execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub id: String,
    pub description: String,
    /// Concrete tool name, [`TOOL_TBD`] or [`TOOL_NONE`]
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub success_criteria: String,
    /// Capability to route through the capability registry instead of a fixed tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
}

impl PlannedStep {
    /// Create a step with an undecided tool.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            tool_name: TOOL_TBD.to_string(),
            parameters: Value::Object(Default::default()),
            success_criteria: String::new(),
            capability: None,
        }
    }

    /// Set the tool.
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool_name = tool.into();
        self
    }

    /// Set the parameters.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the success criteria.
    pub fn with_success_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.success_criteria = criteria.into();
        self
    }

    /// Route through a capability.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    pub fn is_tool_undecided(&self) -> bool {
        self.tool_name == TOOL_TBD
    }

    pub fn needs_no_tool(&self) -> bool {
        self.tool_name == TOOL_NONE
    }
}

/// An ordered, linear multi-step plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: String,
    pub task: String,
    pub steps: Vec<PlannedStep>,
    pub confidence: f64,
}

impl ExecutionPlan {
    pub fn new(task: impl Into<String>, steps: Vec<PlannedStep>, confidence: f64) -> Self {
        Self {
            id: prefixed_id("plan"),
            task: task.into(),
            steps,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// A plan with no steps. Callers treat this as a planning failure.
    pub fn empty(task: impl Into<String>) -> Self {
        Self::new(task, Vec::new(), 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

// ============================================================================
// Step history
// ============================================================================

/// Immutable record of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub step_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<String>,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub summary: String,
}

/// A single tool call made while executing a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub parameters: Value,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Overall status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed,
    Aborted,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Succeeded => write!(f, "succeeded"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Aborted => write!(f, "aborted"),
        }
    }
}

// ============================================================================
// Reflection
// ============================================================================

/// Next action recommended after reflecting on a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Continue,
    Retry,
    Abort,
    ModifyPlan,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Continue => write!(f, "continue"),
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::Abort => write!(f, "abort"),
            SuggestedAction::ModifyPlan => write!(f, "modify_plan"),
        }
    }
}

/// Qualitative assessment of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub performance: String,
    pub quality: String,
}

/// Post-step critique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub step_id: String,
    pub assessment: Assessment,
    pub suggested_action: SuggestedAction,
    pub reasoning: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Insights and errors
// ============================================================================

/// A learned observation about the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub insight_type: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Insight {
    pub fn new(insight_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            insight_type: insight_type.into(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }

    /// Same type and description, regardless of timestamp.
    pub fn same_content(&self, other: &Insight) -> bool {
        self.insight_type == other.insight_type && self.description == other.description
    }
}

/// An entry in the session's error history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            step_id: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn for_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }
}
