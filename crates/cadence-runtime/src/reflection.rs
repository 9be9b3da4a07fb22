//! Reflection Engine
//!
//! Critiques a completed step through the external reflective-analysis tool
//! and recommends what the orchestrator should do next. A failed reflection
//! call never propagates: it yields a conservative `abort` recommendation.

use cadence_core::{
    Assessment, ExecutionStep, Reflection, SuggestedAction, ToolRegistry,
};
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::guard::CallGuard;

/// Confidence of the fallback reflection used when analysis fails.
pub const FALLBACK_CONFIDENCE: f64 = 0.9;

const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Parsed conclusion of the reflective-analysis tool.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Conclusion {
    pub summary: String,
    pub confidence: Option<f64>,
    pub quality: Option<String>,
    pub performance: Option<String>,
}

/// Extract a conclusion from a JSON object, a JSON string or plain text.
pub fn parse_conclusion(value: &Value) -> Conclusion {
    match value {
        Value::Object(object) => conclusion_from_object(object),
        Value::String(text) => match serde_json::from_str::<Value>(text.trim()) {
            Ok(Value::Object(object)) => conclusion_from_object(&object),
            Ok(Value::String(inner)) => Conclusion {
                summary: inner,
                ..Conclusion::default()
            },
            _ => Conclusion {
                summary: text.trim().to_string(),
                ..Conclusion::default()
            },
        },
        Value::Null => Conclusion::default(),
        other => Conclusion {
            summary: other.to_string(),
            ..Conclusion::default()
        },
    }
}

fn conclusion_from_object(object: &Map<String, Value>) -> Conclusion {
    let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
    Conclusion {
        summary: ["summary", "conclusion", "analysis"]
            .iter()
            .find_map(|key| text(key))
            .unwrap_or_default(),
        confidence: object
            .get("confidence")
            .and_then(Value::as_f64)
            .map(|c| c.clamp(0.0, 1.0)),
        quality: text("quality"),
        performance: text("performance"),
    }
}

/// Map a conclusion to an action. Successful steps always continue.
pub fn suggest_action(step_succeeded: bool, summary: &str) -> SuggestedAction {
    if step_succeeded {
        return SuggestedAction::Continue;
    }
    let lowered = summary.to_lowercase();
    if lowered.contains("retry") {
        SuggestedAction::Retry
    } else if lowered.contains("modify") || lowered.contains("alternative") {
        SuggestedAction::ModifyPlan
    } else {
        SuggestedAction::Abort
    }
}

/// Builds critiques through the reflective-analysis tool.
#[derive(Clone)]
pub struct ReflectionEngine {
    tools: Arc<dyn ToolRegistry>,
    reflection_tool: String,
}

impl std::fmt::Debug for ReflectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectionEngine")
            .field("reflection_tool", &self.reflection_tool)
            .finish_non_exhaustive()
    }
}

impl ReflectionEngine {
    pub fn new(tools: Arc<dyn ToolRegistry>, reflection_tool: impl Into<String>) -> Self {
        Self {
            tools,
            reflection_tool: reflection_tool.into(),
        }
    }

    /// Critique `step`, taken while working on `task`.
    pub async fn reflect(&self, step: &ExecutionStep, task: &str, guard: &CallGuard) -> Reflection {
        let payload = json!({
            "prompt": critique_prompt(step),
            "task": task,
            "step": step,
        });

        let outcome = guard
            .run(
                "reflection tool",
                self.tools.execute_tool(&self.reflection_tool, payload),
            )
            .await;

        let conclusion = match outcome {
            Ok(outcome) if outcome.success => {
                parse_conclusion(outcome.result.as_ref().unwrap_or(&Value::Null))
            }
            Ok(outcome) => {
                let reason = outcome
                    .error
                    .unwrap_or_else(|| "reflection tool failed".to_string());
                return fallback_reflection(step, &reason);
            }
            Err(e) => return fallback_reflection(step, &e.to_string()),
        };

        let suggested_action = suggest_action(step.success, &conclusion.summary);
        debug!(
            step = %step.step_id,
            action = %suggested_action,
            "Reflection complete"
        );

        let (default_performance, default_quality) = if step.success {
            ("good", "acceptable")
        } else {
            ("poor", "failed")
        };
        Reflection {
            step_id: step.step_id.clone(),
            assessment: Assessment {
                performance: conclusion
                    .performance
                    .unwrap_or_else(|| default_performance.to_string()),
                quality: conclusion
                    .quality
                    .unwrap_or_else(|| default_quality.to_string()),
            },
            suggested_action,
            reasoning: conclusion.summary,
            confidence: conclusion.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            created_at: Utc::now(),
        }
    }
}

fn critique_prompt(step: &ExecutionStep) -> String {
    let tool = step.tool_used.as_deref().unwrap_or("no tool");
    if step.success {
        format!(
            "Step '{}' succeeded using {} in {}ms. Outcome: {}. \
             Assess the quality of the result and whether the plan should continue.",
            step.step_id, tool, step.duration_ms, step.summary
        )
    } else {
        format!(
            "Step '{}' failed using {} after {}ms with error: {}. \
             Diagnose the failure and recommend whether to retry the step, \
             modify the plan with an alternative approach, or abort.",
            step.step_id,
            tool,
            step.duration_ms,
            step.error.as_deref().unwrap_or("unknown error")
        )
    }
}

fn fallback_reflection(step: &ExecutionStep, reason: &str) -> Reflection {
    warn!(step = %step.step_id, error = %reason, "Reflection failed, recommending abort");
    Reflection {
        step_id: step.step_id.clone(),
        assessment: Assessment {
            performance: "unknown".to_string(),
            quality: "unknown".to_string(),
        },
        suggested_action: SuggestedAction::Abort,
        reasoning: format!("Reflection unavailable: {}", reason),
        confidence: FALLBACK_CONFIDENCE,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_testing::{MockTool, MockToolRegistry};
    use std::time::Duration;

    fn step(success: bool) -> ExecutionStep {
        let now = Utc::now();
        ExecutionStep {
            step_id: "step_1".to_string(),
            started_at: now,
            completed_at: now,
            duration_ms: 12,
            success,
            tool_used: Some("calculator".to_string()),
            parameters: json!({"a": 1}),
            result: None,
            error: (!success).then(|| "division by zero".to_string()),
            summary: "computed".to_string(),
        }
    }

    fn guard() -> CallGuard {
        CallGuard::with_timeout(Duration::from_secs(5))
    }

    #[test]
    fn test_suggest_action_keywords() {
        assert_eq!(suggest_action(true, "abort everything"), SuggestedAction::Continue);
        assert_eq!(suggest_action(false, "Please RETRY the call"), SuggestedAction::Retry);
        assert_eq!(
            suggest_action(false, "Use an alternative tool"),
            SuggestedAction::ModifyPlan
        );
        assert_eq!(suggest_action(false, "modify the plan"), SuggestedAction::ModifyPlan);
        assert_eq!(suggest_action(false, "hopeless"), SuggestedAction::Abort);
    }

    #[test]
    fn test_parse_conclusion_shapes() {
        let object = parse_conclusion(&json!({
            "conclusion": "retry later",
            "confidence": 1.7,
            "quality": "low"
        }));
        assert_eq!(object.summary, "retry later");
        assert_eq!(object.confidence, Some(1.0));
        assert_eq!(object.quality.as_deref(), Some("low"));

        let embedded = parse_conclusion(&json!(r#"{"analysis": "fine"}"#));
        assert_eq!(embedded.summary, "fine");

        let plain = parse_conclusion(&json!("  just text  "));
        assert_eq!(plain.summary, "just text");
    }

    #[tokio::test]
    async fn test_failed_step_reflection() {
        let tools = MockToolRegistry::new().with_reflection_tool(
            "reflective_analysis",
            json!({"summary": "Transient error, retry the step", "confidence": 0.6}),
        );
        let engine = ReflectionEngine::new(Arc::new(tools.clone()), "reflective_analysis");

        let reflection = engine.reflect(&step(false), "divide", &guard()).await;
        assert_eq!(reflection.suggested_action, SuggestedAction::Retry);
        assert_eq!(reflection.confidence, 0.6);
        assert_eq!(reflection.assessment.quality, "failed");

        let payload = tools
            .get_mock_tool("reflective_analysis")
            .unwrap()
            .call_history()
            .remove(0);
        assert!(payload["prompt"].as_str().unwrap().contains("division by zero"));
        assert_eq!(payload["step"]["step_id"], "step_1");
    }

    #[tokio::test]
    async fn test_successful_step_continues() {
        let tools = MockToolRegistry::new()
            .with_reflection_tool("reflective_analysis", json!("Looks right, but retry if unsure"));
        let engine = ReflectionEngine::new(Arc::new(tools), "reflective_analysis");

        let reflection = engine.reflect(&step(true), "add", &guard()).await;
        assert_eq!(reflection.suggested_action, SuggestedAction::Continue);
        assert_eq!(reflection.assessment.performance, "good");
    }

    #[tokio::test]
    async fn test_reflection_failure_falls_back_to_abort() {
        let tools = MockToolRegistry::new()
            .with_tool(MockTool::new("reflective_analysis").with_default_failure("quota exceeded"));
        let engine = ReflectionEngine::new(Arc::new(tools), "reflective_analysis");

        let reflection = engine.reflect(&step(false), "divide", &guard()).await;
        assert_eq!(reflection.suggested_action, SuggestedAction::Abort);
        assert_eq!(reflection.confidence, FALLBACK_CONFIDENCE);
        assert!(reflection.reasoning.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_missing_reflection_tool_falls_back() {
        let engine = ReflectionEngine::new(Arc::new(MockToolRegistry::new()), "reflective_analysis");
        let reflection = engine.reflect(&step(true), "add", &guard()).await;
        assert_eq!(reflection.suggested_action, SuggestedAction::Abort);
    }
}
