//! Planning Engine
//!
//! Classifies task complexity and turns free text into an [`ExecutionPlan`]
//! by delegating to an external planning tool, then parsing whatever plan
//! text it returns.

use cadence_core::{
    AgentConfig, CadenceResult, ExecutionPlan, Insight, PlannedStep, RuntimeError, TOOL_NONE,
    TOOL_TBD, ToolRegistry,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::guard::CallGuard;
use crate::protocol::strip_code_fence;

/// Lower-cased substrings that mark a task as multi-step.
pub const PLANNING_KEYWORDS: [&str; 7] = [
    "then",
    "and then",
    "after that",
    "first",
    "second",
    "finally",
    "create a plan",
];

/// Tasks longer than this many characters always get a plan.
pub const LONG_TASK_THRESHOLD: usize = 200;

const JSON_PLAN_CONFIDENCE: f64 = 0.8;
const LINE_PLAN_CONFIDENCE: f64 = 0.5;

/// Insights forwarded to the planner.
const PLANNING_INSIGHT_LIMIT: usize = 5;

static NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d+\.\s*(\S.*)$").expect("numbered line pattern is a valid regex")
});

// ============================================================================
// Task analysis
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskComplexity {
    Simple,
    MultiStep,
}

/// Result of [`analyze_task`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub complexity: TaskComplexity,
    pub requires_planning: bool,
    /// Keywords found in the task
    pub matched_keywords: Vec<String>,
    /// Task length in characters
    pub length: usize,
}

/// Classify a task. Deterministic: keyword containment or length only.
pub fn analyze_task(task: &str) -> TaskAnalysis {
    let lowered = task.to_lowercase();
    let matched_keywords: Vec<String> = PLANNING_KEYWORDS
        .iter()
        .filter(|keyword| lowered.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect();
    let length = task.chars().count();

    let requires_planning = !matched_keywords.is_empty() || length > LONG_TASK_THRESHOLD;
    TaskAnalysis {
        complexity: if requires_planning {
            TaskComplexity::MultiStep
        } else {
            TaskComplexity::Simple
        },
        requires_planning,
        matched_keywords,
        length,
    }
}

// ============================================================================
// Plan parsing
// ============================================================================

/// Parse raw planner output into a plan.
///
/// JSON is tried first (a top-level array, `.plan`, `.steps`, or the first
/// array-valued key). If the text is not JSON, lines starting with
/// `<number>.` become steps. Otherwise the plan is empty; callers treat an
/// empty plan as a planning failure.
pub fn parse_plan(task: &str, raw: &str) -> ExecutionPlan {
    let body = strip_code_fence(raw);
    match serde_json::from_str::<Value>(body) {
        Ok(Value::String(inner)) => parse_plan(task, &inner),
        Ok(value) => parse_plan_value(task, &value),
        Err(_) => parse_numbered_lines(task, body),
    }
}

/// Parse an already-structured plan.
pub fn parse_plan_value(task: &str, value: &Value) -> ExecutionPlan {
    if let Value::String(text) = value {
        return parse_plan(task, text);
    }

    let Some(items) = locate_steps(value) else {
        return ExecutionPlan::empty(task);
    };
    let steps: Vec<PlannedStep> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| step_from_value(i, item))
        .collect();
    if steps.is_empty() {
        return ExecutionPlan::empty(task);
    }

    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(JSON_PLAN_CONFIDENCE);
    ExecutionPlan::new(task, steps, confidence)
}

fn locate_steps(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(object) => {
            for key in ["plan", "steps"] {
                match object.get(key) {
                    Some(Value::Array(items)) => return Some(items),
                    Some(nested @ Value::Object(_)) => {
                        if let Some(items) = locate_steps(nested) {
                            return Some(items);
                        }
                    }
                    _ => {}
                }
            }
            object.values().find_map(Value::as_array)
        }
        _ => None,
    }
}

fn first_field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

fn text_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_field(object, keys).and_then(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn step_from_value(index: usize, item: &Value) -> Option<PlannedStep> {
    let default_id = format!("step_{}", index + 1);
    match item {
        Value::String(description) if !description.trim().is_empty() => {
            Some(PlannedStep::new(default_id, description.trim()))
        }
        Value::Object(object) => {
            let description =
                text_field(object, &["description", "step", "action", "task", "title"])?;
            let id = text_field(object, &["id", "step_id"]).unwrap_or(default_id);

            let tool = match first_field(object, &["tool_name", "toolName", "tool"]) {
                None => TOOL_TBD.to_string(),
                Some(Value::Null) => TOOL_NONE.to_string(),
                Some(Value::String(name)) if name.trim().eq_ignore_ascii_case(TOOL_NONE) => {
                    TOOL_NONE.to_string()
                }
                Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
                Some(_) => TOOL_TBD.to_string(),
            };

            let parameters = match first_field(object, &["parameters", "params", "args"]) {
                Some(Value::Object(params)) => Value::Object(params.clone()),
                _ => json!({}),
            };

            let mut step = PlannedStep::new(id, description)
                .with_tool(tool)
                .with_parameters(parameters);
            if let Some(criteria) = text_field(
                object,
                &["success_criteria", "successCriteria", "expected_outcome"],
            ) {
                step = step.with_success_criteria(criteria);
            }
            if let Some(capability) = text_field(object, &["capability"]) {
                step = step.with_capability(capability);
            }
            Some(step)
        }
        _ => None,
    }
}

fn parse_numbered_lines(task: &str, text: &str) -> ExecutionPlan {
    let steps: Vec<PlannedStep> = text
        .lines()
        .filter_map(|line| NUMBERED_LINE.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .enumerate()
        .map(|(i, description)| PlannedStep::new(format!("step_{}", i + 1), description))
        .collect();

    if steps.is_empty() {
        ExecutionPlan::empty(task)
    } else {
        ExecutionPlan::new(task, steps, LINE_PLAN_CONFIDENCE)
    }
}

// ============================================================================
// PlanningEngine
// ============================================================================

/// Produces plans through the external planning tool.
#[derive(Clone)]
pub struct PlanningEngine {
    tools: Arc<dyn ToolRegistry>,
    planning_tool: String,
    max_plan_steps: usize,
}

impl std::fmt::Debug for PlanningEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanningEngine")
            .field("planning_tool", &self.planning_tool)
            .field("max_plan_steps", &self.max_plan_steps)
            .finish_non_exhaustive()
    }
}

impl PlanningEngine {
    pub fn new(
        tools: Arc<dyn ToolRegistry>,
        planning_tool: impl Into<String>,
        max_plan_steps: usize,
    ) -> Self {
        Self {
            tools,
            planning_tool: planning_tool.into(),
            max_plan_steps,
        }
    }

    pub fn analyze_task(&self, task: &str) -> TaskAnalysis {
        analyze_task(task)
    }

    /// Ask the planning tool for a plan.
    ///
    /// Fails with [`RuntimeError::Planning`] if the tool fails or the result
    /// contains no executable steps.
    pub async fn create_execution_plan(
        &self,
        task: &str,
        agent: &AgentConfig,
        insights: &[Insight],
        guard: &CallGuard,
    ) -> CadenceResult<ExecutionPlan> {
        let payload = self.planning_payload(task, agent, insights, guard).await?;

        debug!(tool = %self.planning_tool, agent.id = %agent.id, "Requesting execution plan");
        let outcome = guard
            .run(
                "planning tool",
                self.tools.execute_tool(&self.planning_tool, payload),
            )
            .await?;

        if !outcome.success {
            let message = outcome
                .error
                .unwrap_or_else(|| "planning tool failed without an error message".to_string());
            warn!(tool = %self.planning_tool, error = %message, "Planning tool failed");
            return Err(RuntimeError::Planning(message));
        }

        let plan = match outcome.result {
            Some(value) => parse_plan_value(task, &value),
            None => ExecutionPlan::empty(task),
        };
        if plan.is_empty() {
            return Err(RuntimeError::Planning(
                "planner returned no executable steps".to_string(),
            ));
        }

        info!(
            plan.id = %plan.id,
            steps = plan.len(),
            confidence = plan.confidence,
            "Execution plan created"
        );
        Ok(plan)
    }

    async fn planning_payload(
        &self,
        task: &str,
        agent: &AgentConfig,
        insights: &[Insight],
        guard: &CallGuard,
    ) -> CadenceResult<Value> {
        let mut tools = Vec::with_capacity(agent.tools.len());
        for name in &agent.tools {
            let info = guard
                .run("tool info", self.tools.get_tool_info(name))
                .await?;
            tools.push(json!({
                "name": name,
                "description": info.map(|i| i.description).unwrap_or_default(),
            }));
        }

        let recent: Vec<Value> = insights
            .iter()
            .rev()
            .take(PLANNING_INSIGHT_LIMIT)
            .map(|i| json!({"type": i.insight_type, "description": i.description}))
            .collect();

        Ok(json!({
            "task": task,
            "agent_id": agent.id,
            "available_tools": tools,
            "insights": recent,
            "max_steps": self.max_plan_steps,
        }))
    }
}
