//! Execution Engine
//!
//! Drives the tool-call protocol against the LLM. Two modes:
//!
//! - **Single-shot**: one completion; if it names a tool, run it and report
//!   the tool's outcome as the step outcome.
//! - **Orchestration**: up to [`MAX_ORCHESTRATION_STEPS`] completions, each
//!   tool result fed back into the next request, ending when the model
//!   answers with `tool_name: "none"`.
//!
//! Every failure (transport, protocol, tool) is captured in the returned
//! [`StepOutcome`]; nothing escapes as an error.

use cadence_core::{
    AgentConfig, ChatMessage, CompletionRequest, ExecutionStep, LlmHandler, PlannedStep,
    RuntimeError, SystemPromptService, ToolError, ToolInvocation, ToolRegistry,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::guard::CallGuard;
use crate::protocol::{ToolDecision, parse_tool_decision};

/// Upper bound on completions in one orchestration loop.
pub const MAX_ORCHESTRATION_STEPS: usize = 5;

const SUMMARY_CHARS: usize = 200;

static ORCHESTRATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    let patterns = [
        r"(?is)\bfirst\b.*\bthen\b",
        r"(?i)\bfollowed by\b",
        r"(?i)\band then\b",
        r"(?i)\bafter (?:that|which)\b",
        r"(?m)^\s*1[.)]\s+\S[^\n]*\n\s*2[.)]\s+\S",
    ];
    patterns
        .into_iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

/// Whether the task reads as a sequence of tool calls.
pub fn requires_orchestration(task: &str) -> bool {
    ORCHESTRATION_PATTERNS.iter().any(|re| re.is_match(task))
}

/// How a step was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    SingleShot,
    Orchestrated,
    DirectTool,
    PlainCompletion,
}

/// Result of one engine call.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub mode: ExecutionMode,
    pub success: bool,
    /// Final text for the user
    pub response: Option<String>,
    /// Last tool result, or the response as a JSON string
    pub result: Option<Value>,
    pub error: Option<RuntimeError>,
    /// `None` when no tool ran
    pub tools_executed: Option<Vec<ToolInvocation>>,
    pub llm_calls: usize,
    pub duration_ms: u64,
}

impl StepOutcome {
    fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            success: false,
            response: None,
            result: None,
            error: None,
            tools_executed: None,
            llm_calls: 0,
            duration_ms: 0,
        }
    }

    /// A step that failed before anything ran.
    pub fn rejected(mode: ExecutionMode, error: RuntimeError) -> Self {
        Self::new(mode).fail(error)
    }

    fn succeed(mut self, response: String, result: Option<Value>) -> Self {
        self.success = true;
        self.result = result.or_else(|| Some(Value::String(response.clone())));
        self.response = Some(response);
        self.error = None;
        self
    }

    fn fail(mut self, error: RuntimeError) -> Self {
        self.success = false;
        self.error = Some(error);
        self
    }

    fn record_tool(&mut self, invocation: ToolInvocation) {
        self.tools_executed
            .get_or_insert_with(Vec::new)
            .push(invocation);
    }

    pub fn tool_calls(&self) -> usize {
        self.tools_executed.as_ref().map_or(0, Vec::len)
    }

    /// Name of the last tool that ran.
    pub fn last_tool(&self) -> Option<&str> {
        self.tools_executed
            .as_ref()
            .and_then(|calls| calls.last())
            .map(|call| call.tool_name.as_str())
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Build the immutable history record for this outcome.
    pub fn to_execution_step(
        &self,
        step_id: impl Into<String>,
        started_at: DateTime<Utc>,
        parameters: Value,
    ) -> ExecutionStep {
        let summary = match (&self.response, &self.error) {
            (_, Some(error)) => format!("failed: {}", error),
            (Some(response), None) => truncate(response, SUMMARY_CHARS),
            (None, None) => "completed".to_string(),
        };
        ExecutionStep {
            step_id: step_id.into(),
            started_at,
            completed_at: Utc::now(),
            duration_ms: self.duration_ms,
            success: self.success,
            tool_used: self.last_tool().map(str::to_string),
            parameters,
            result: self.result.clone(),
            error: self.error_message(),
            summary,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

/// Render a tool result as text for the model or the user.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// ExecutionEngine
// ============================================================================

/// Runs tasks and planned steps through the LLM tool-call protocol.
#[derive(Clone)]
pub struct ExecutionEngine {
    llm: Arc<dyn LlmHandler>,
    tools: Arc<dyn ToolRegistry>,
    prompts: Arc<dyn SystemPromptService>,
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine").finish_non_exhaustive()
    }
}

impl ExecutionEngine {
    pub fn new(
        llm: Arc<dyn LlmHandler>,
        tools: Arc<dyn ToolRegistry>,
        prompts: Arc<dyn SystemPromptService>,
    ) -> Self {
        Self {
            llm,
            tools,
            prompts,
        }
    }

    /// Run a whole task, choosing orchestration when the task reads as a
    /// sequence and the agent has tools.
    pub async fn execute(&self, task: &str, agent: &AgentConfig, guard: &CallGuard) -> StepOutcome {
        if agent.has_tools() && requires_orchestration(task) {
            self.execute_orchestrated(task, agent, guard).await
        } else {
            self.execute_single_shot(task, agent, guard).await
        }
    }

    /// One completion, at most one tool call.
    pub async fn execute_single_shot(
        &self,
        task: &str,
        agent: &AgentConfig,
        guard: &CallGuard,
    ) -> StepOutcome {
        let started = Instant::now();
        let mut outcome = StepOutcome::new(ExecutionMode::SingleShot);

        let messages = match self.opening_messages(task, agent, guard).await {
            Ok(messages) => messages,
            Err(e) => return finish(outcome.fail(e), started),
        };

        outcome.llm_calls += 1;
        let content = match self.complete(agent, messages, agent.has_tools(), guard).await {
            Ok(content) => content,
            Err(e) => return finish(outcome.fail(e), started),
        };

        if !agent.has_tools() {
            let response = match parse_tool_decision(&content) {
                Ok(ToolDecision::Respond { response }) if !response.is_empty() => response,
                _ => content,
            };
            return finish(outcome.succeed(response, None), started);
        }

        let outcome = match parse_tool_decision(&content) {
            Err(e) => outcome.fail(e),
            Ok(ToolDecision::Respond { response }) => outcome.succeed(response, None),
            Ok(ToolDecision::Unspecified { .. }) => outcome.fail(no_tool_selected()),
            Ok(ToolDecision::Invoke {
                tool_name,
                parameters,
            }) => {
                if !agent.allows_tool(&tool_name) {
                    outcome.fail(not_permitted(&tool_name, agent))
                } else {
                    let invocation = self.invoke_tool(&tool_name, parameters, guard).await;
                    outcome.record_tool(invocation.clone());
                    tool_outcome(outcome, invocation)
                }
            }
        };
        finish(outcome, started)
    }

    /// Iterative tool-call loop bounded by [`MAX_ORCHESTRATION_STEPS`].
    pub async fn execute_orchestrated(
        &self,
        task: &str,
        agent: &AgentConfig,
        guard: &CallGuard,
    ) -> StepOutcome {
        let started = Instant::now();
        let mut outcome = StepOutcome::new(ExecutionMode::Orchestrated);

        let mut messages = match self.opening_messages(task, agent, guard).await {
            Ok(messages) => messages,
            Err(e) => return finish(outcome.fail(e), started),
        };

        for iteration in 1..=MAX_ORCHESTRATION_STEPS {
            outcome.llm_calls += 1;
            let content = match self.complete(agent, messages.clone(), true, guard).await {
                Ok(content) => content,
                Err(e) => return finish(outcome.fail(e), started),
            };

            let decision = match parse_tool_decision(&content) {
                Ok(decision) => decision,
                Err(e) => return finish(outcome.fail(e), started),
            };
            debug!(
                agent.id = %agent.id,
                iteration,
                tool = ?decision.tool_name(),
                "Orchestration decision"
            );

            let (tool_name, parameters) = match decision {
                ToolDecision::Respond { response } if response.is_empty() => {
                    // Bare "none": the last tool result is the answer
                    let result = outcome.result.clone();
                    let response = result.as_ref().map(render_value).unwrap_or_default();
                    return finish(outcome.succeed(response, result), started);
                }
                ToolDecision::Respond { response } => {
                    return finish(outcome.succeed(response, None), started);
                }
                ToolDecision::Unspecified { .. } => {
                    return finish(outcome.fail(no_tool_selected()), started);
                }
                ToolDecision::Invoke {
                    tool_name,
                    parameters,
                } => (tool_name, parameters),
            };

            if !agent.allows_tool(&tool_name) {
                return finish(outcome.fail(not_permitted(&tool_name, agent)), started);
            }

            let invocation = self.invoke_tool(&tool_name, parameters, guard).await;
            outcome.record_tool(invocation.clone());
            if !invocation.success {
                return finish(tool_outcome(outcome, invocation), started);
            }

            let rendered = invocation
                .result
                .as_ref()
                .map(render_value)
                .unwrap_or_else(|| "null".to_string());
            messages.push(ChatMessage::assistant(content));
            messages.push(ChatMessage::user(format!(
                "Tool '{}' returned: {}\nContinue with the next tool call, or answer with \
                 {{\"tool_name\": \"none\", \"response\": \"...\"}} when the task is complete.",
                tool_name, rendered
            )));
            outcome.result = invocation.result;
        }

        warn!(
            agent.id = %agent.id,
            limit = MAX_ORCHESTRATION_STEPS,
            "Orchestration hit the maximum step limit"
        );
        let error = RuntimeError::Validation(format!(
            "orchestration exceeded the maximum step limit of {}",
            MAX_ORCHESTRATION_STEPS
        ));
        finish(outcome.fail(error), started)
    }

    /// Execute one planned step with already-resolved parameters.
    ///
    /// A concrete tool runs directly; `TBD` lets the model pick a tool for the
    /// step description; `none` is a plain completion. Steps routed through a
    /// capability bypass the agent's tool list.
    pub async fn execute_planned_step(
        &self,
        step: &PlannedStep,
        parameters: Value,
        agent: &AgentConfig,
        guard: &CallGuard,
    ) -> StepOutcome {
        if step.needs_no_tool() {
            return self
                .execute_plain_completion(&step_prompt(step, &parameters), agent, guard)
                .await;
        }
        if step.is_tool_undecided() {
            return self
                .execute_single_shot(&step_prompt(step, &parameters), agent, guard)
                .await;
        }

        let started = Instant::now();
        let mut outcome = StepOutcome::new(ExecutionMode::DirectTool);
        if step.capability.is_none() && !agent.allows_tool(&step.tool_name) {
            return finish(outcome.fail(not_permitted(&step.tool_name, agent)), started);
        }

        let invocation = self.invoke_tool(&step.tool_name, parameters, guard).await;
        outcome.record_tool(invocation.clone());
        finish(tool_outcome(outcome, invocation), started)
    }

    /// Completion without the tool protocol.
    pub async fn execute_plain_completion(
        &self,
        prompt: &str,
        agent: &AgentConfig,
        guard: &CallGuard,
    ) -> StepOutcome {
        let started = Instant::now();
        let mut outcome = StepOutcome::new(ExecutionMode::PlainCompletion);
        let messages = vec![
            ChatMessage::system(self.prompts.generate_system_prompt(agent, false)),
            ChatMessage::user(prompt),
        ];

        outcome.llm_calls += 1;
        let outcome = match self.complete(agent, messages, false, guard).await {
            Ok(content) => outcome.succeed(content, None),
            Err(e) => outcome.fail(e),
        };
        finish(outcome, started)
    }

    async fn opening_messages(
        &self,
        task: &str,
        agent: &AgentConfig,
        guard: &CallGuard,
    ) -> Result<Vec<ChatMessage>, RuntimeError> {
        let mut system = self
            .prompts
            .generate_system_prompt(agent, agent.has_tools());

        if agent.has_tools() {
            let mut catalogue = String::new();
            for name in &agent.tools {
                let info = guard.run("tool info", self.tools.get_tool_info(name)).await?;
                match info {
                    Some(info) => catalogue.push_str(&format!("- {}: {}\n", name, info.description)),
                    None => catalogue.push_str(&format!("- {}\n", name)),
                }
            }
            system.push_str(&format!(
                "\n\nAvailable tools:\n{}\nRespond with exactly one JSON object and no other text.\n\
                 To call a tool: {{\"tool_name\": \"<name>\", \"parameters\": {{...}}}}\n\
                 If no tool is needed: {{\"tool_name\": \"none\", \"response\": \"<answer>\"}}",
                catalogue
            ));
        }

        Ok(vec![ChatMessage::system(system), ChatMessage::user(task)])
    }

    async fn complete(
        &self,
        agent: &AgentConfig,
        messages: Vec<ChatMessage>,
        expects_json_response: bool,
        guard: &CallGuard,
    ) -> Result<String, RuntimeError> {
        let request = CompletionRequest {
            messages,
            model_config: agent.model.clone(),
            expects_json_response,
        };
        let response = guard
            .run_result("llm completion", self.llm.complete(request))
            .await?;

        if response.content.trim().is_empty() {
            return Err(RuntimeError::Llm("empty completion".to_string()));
        }
        debug!(
            model = %response.model,
            tokens = response.usage.total(),
            "Completion received"
        );
        Ok(response.content)
    }

    async fn invoke_tool(&self, tool_name: &str, parameters: Value, guard: &CallGuard) -> ToolInvocation {
        let started = Instant::now();
        let outcome = guard
            .run("tool execution", self.tools.execute_tool(tool_name, parameters.clone()))
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let invocation = match outcome {
            Ok(outcome) => ToolInvocation {
                tool_name: tool_name.to_string(),
                parameters,
                success: outcome.success,
                result: outcome.result,
                error: if outcome.success {
                    None
                } else {
                    Some(
                        outcome
                            .error
                            .unwrap_or_else(|| "tool reported failure".to_string()),
                    )
                },
                duration_ms,
            },
            Err(e) => ToolInvocation {
                tool_name: tool_name.to_string(),
                parameters,
                success: false,
                result: None,
                error: Some(e.to_string()),
                duration_ms,
            },
        };

        if invocation.success {
            info!(tool = %tool_name, duration_ms, "Tool executed");
        } else {
            warn!(
                tool = %tool_name,
                duration_ms,
                error = ?invocation.error,
                "Tool execution failed"
            );
        }
        invocation
    }
}

fn finish(mut outcome: StepOutcome, started: Instant) -> StepOutcome {
    outcome.duration_ms = started.elapsed().as_millis() as u64;
    outcome
}

fn tool_outcome(outcome: StepOutcome, invocation: ToolInvocation) -> StepOutcome {
    if invocation.success {
        let response = invocation
            .result
            .as_ref()
            .map(render_value)
            .unwrap_or_default();
        outcome.succeed(response, invocation.result)
    } else {
        outcome.fail(RuntimeError::Tool(ToolError::ExecutionFailed {
            tool: invocation.tool_name,
            message: invocation.error.unwrap_or_default(),
        }))
    }
}

fn no_tool_selected() -> RuntimeError {
    RuntimeError::Validation("agent has tools but did not select one".to_string())
}

fn not_permitted(tool: &str, agent: &AgentConfig) -> RuntimeError {
    RuntimeError::Tool(ToolError::NotPermitted {
        tool: tool.to_string(),
        agent: agent.id.clone(),
    })
}

fn step_prompt(step: &PlannedStep, parameters: &Value) -> String {
    let mut prompt = step.description.clone();
    if parameters.as_object().is_some_and(|p| !p.is_empty()) {
        prompt.push_str(&format!("\n\nParameters: {}", parameters));
    }
    if !step.success_criteria.is_empty() {
        prompt.push_str(&format!("\nSuccess criteria: {}", step.success_criteria));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_testing::{MockToolRegistry, ScriptedLlm, StaticPromptService, fixtures};
    use serde_json::json;
    use std::time::Duration;

    fn engine(llm: ScriptedLlm, tools: MockToolRegistry) -> ExecutionEngine {
        ExecutionEngine::new(
            Arc::new(llm),
            Arc::new(tools),
            Arc::new(StaticPromptService::default()),
        )
    }

    fn guard() -> CallGuard {
        CallGuard::with_timeout(Duration::from_secs(5))
    }

    #[test]
    fn test_orchestration_heuristics() {
        assert!(requires_orchestration("First add 2 and 3, then double it"));
        assert!(requires_orchestration("search docs followed by a summary"));
        assert!(requires_orchestration("1. fetch the page\n2. extract links"));
        assert!(!requires_orchestration("What is 2 + 3?"));
        assert!(!requires_orchestration("1. only one item"));
    }

    #[tokio::test]
    async fn test_tool_less_agent_single_shot() {
        let llm = ScriptedLlm::always("Paris is the capital of France.");
        let engine = engine(llm.clone(), MockToolRegistry::new());

        let outcome = engine
            .execute("Capital of France?", &fixtures::plain_agent(), &guard())
            .await;

        assert!(outcome.success);
        assert!(outcome.tools_executed.is_none());
        assert_eq!(outcome.response.as_deref(), Some("Paris is the capital of France."));
        assert_eq!(outcome.llm_calls, 1);
        assert!(!llm.last_request().unwrap().expects_json_response);
    }

    #[tokio::test]
    async fn test_single_shot_runs_selected_tool() {
        let llm = ScriptedLlm::new()
            .with_replies([fixtures::tool_call("calculator", json!({"a": 2, "b": 3}))]);
        let tools = MockToolRegistry::new().with_calculator();
        let engine = engine(llm.clone(), tools.clone());

        let outcome = engine
            .execute("Add 2 and 3", &fixtures::tool_agent(["calculator"]), &guard())
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result, Some(json!({"sum": 5})));
        assert_eq!(outcome.tool_calls(), 1);
        assert_eq!(tools.calls_to("calculator"), 1);

        let request = llm.last_request().unwrap();
        assert!(request.expects_json_response);
        assert!(request.messages[0].content.contains("calculator: Adds two numbers"));
    }

    #[tokio::test]
    async fn test_not_json_is_a_failed_step() {
        let llm = ScriptedLlm::always("not json");
        let engine = engine(llm, MockToolRegistry::new().with_calculator());

        let outcome = engine
            .execute("Add 2 and 3", &fixtures::tool_agent(["calculator"]), &guard())
            .await;

        assert!(!outcome.success);
        assert!(outcome.error_message().unwrap().contains("invalid JSON"));
        assert!(outcome.tools_executed.is_none());
    }

    #[tokio::test]
    async fn test_agent_with_tools_must_choose() {
        let llm = ScriptedLlm::always(r#"{"response": "I would rather not"}"#);
        let engine = engine(llm, MockToolRegistry::new().with_calculator());

        let outcome = engine
            .execute("Add 2 and 3", &fixtures::tool_agent(["calculator"]), &guard())
            .await;

        assert!(!outcome.success);
        assert!(
            outcome
                .error_message()
                .unwrap()
                .contains("agent has tools but did not select one")
        );
    }

    #[tokio::test]
    async fn test_explicit_none_succeeds() {
        let llm = ScriptedLlm::always(fixtures::final_answer("No tool needed: 5"));
        let engine = engine(llm, MockToolRegistry::new().with_calculator());

        let outcome = engine
            .execute("Say five", &fixtures::tool_agent(["calculator"]), &guard())
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.response.as_deref(), Some("No tool needed: 5"));
        assert!(outcome.tools_executed.is_none());
    }

    #[tokio::test]
    async fn test_unlisted_tool_not_permitted() {
        let llm = ScriptedLlm::always(fixtures::tool_call("fail_tool", json!({})));
        let tools = MockToolRegistry::new().with_mock_tools();
        let engine = engine(llm, tools.clone());

        let outcome = engine
            .execute("Do it", &fixtures::tool_agent(["calculator"]), &guard())
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_ref().unwrap().error_code(), "TOOL_NOT_PERMITTED");
        assert_eq!(tools.calls_to("fail_tool"), 0);
    }

    #[tokio::test]
    async fn test_llm_failure_is_captured() {
        let llm = ScriptedLlm::new().with_error("connection reset");
        let engine = engine(llm, MockToolRegistry::new());

        let outcome = engine
            .execute("Hello", &fixtures::plain_agent(), &guard())
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(RuntimeError::Llm("connection reset".to_string())));
    }

    #[tokio::test]
    async fn test_orchestration_feeds_results_forward() {
        let llm = ScriptedLlm::new().with_replies([
            fixtures::tool_call("calculator", json!({"a": 2, "b": 3})),
            fixtures::tool_call("calculator", json!({"a": 5, "b": 5})),
            fixtures::final_answer("The result is 10"),
        ]);
        let tools = MockToolRegistry::new().with_calculator();
        let engine = engine(llm.clone(), tools);

        let outcome = engine
            .execute(
                "First add 2 and 3, then add 5 to the result",
                &fixtures::tool_agent(["calculator"]),
                &guard(),
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.mode, ExecutionMode::Orchestrated);
        assert_eq!(outcome.llm_calls, 3);
        assert_eq!(outcome.tool_calls(), 2);
        assert_eq!(outcome.response.as_deref(), Some("The result is 10"));

        let second = &llm.requests()[1];
        assert!(
            second
                .messages
                .last()
                .unwrap()
                .content
                .contains(r#"{"sum":5}"#)
        );
    }

    #[tokio::test]
    async fn test_orchestration_step_limit() {
        let llm = ScriptedLlm::always(fixtures::tool_call("echo", json!({"again": true})));
        let engine = engine(llm.clone(), MockToolRegistry::new().with_echo_tool());

        let outcome = engine
            .execute(
                "First echo, then echo again",
                &fixtures::tool_agent(["echo"]),
                &guard(),
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(llm.call_count(), MAX_ORCHESTRATION_STEPS);
        assert_eq!(outcome.llm_calls, MAX_ORCHESTRATION_STEPS);
        assert!(outcome.error_message().unwrap().contains("maximum step limit"));
    }

    #[tokio::test]
    async fn test_orchestration_stops_on_tool_failure() {
        let llm = ScriptedLlm::new().with_replies([
            fixtures::tool_call("fail_tool", json!({})),
            fixtures::final_answer("unreachable"),
        ]);
        let engine = engine(llm.clone(), MockToolRegistry::new().with_mock_tools());

        let outcome = engine
            .execute(
                "First break, then recover",
                &fixtures::tool_agent(["fail_tool"]),
                &guard(),
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(llm.call_count(), 1);
        assert_eq!(outcome.error.as_ref().unwrap().error_code(), "TOOL_EXECUTION_FAILED");
    }

    #[tokio::test]
    async fn test_planned_step_modes() {
        let llm = ScriptedLlm::new()
            .when("Explain", "An explanation")
            .when("Pick a tool", fixtures::tool_call("echo", json!({"x": 1})));
        let tools = MockToolRegistry::new().with_calculator().with_echo_tool();
        let engine = engine(llm.clone(), tools.clone());
        let agent = fixtures::tool_agent(["calculator", "echo"]);

        let direct = PlannedStep::new("s1", "add").with_tool("calculator");
        let outcome = engine
            .execute_planned_step(&direct, json!({"a": 1, "b": 1}), &agent, &guard())
            .await;
        assert_eq!(outcome.mode, ExecutionMode::DirectTool);
        assert_eq!(outcome.result, Some(json!({"sum": 2})));
        assert_eq!(outcome.llm_calls, 0);

        let plain = PlannedStep::new("s2", "Explain the sum").with_tool("none");
        let outcome = engine
            .execute_planned_step(&plain, json!({}), &agent, &guard())
            .await;
        assert_eq!(outcome.mode, ExecutionMode::PlainCompletion);
        assert_eq!(outcome.response.as_deref(), Some("An explanation"));

        let undecided = PlannedStep::new("s3", "Pick a tool for this");
        let outcome = engine
            .execute_planned_step(&undecided, json!({"hint": "echo"}), &agent, &guard())
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.last_tool(), Some("echo"));
        assert!(
            llm.last_request().unwrap().messages[1]
                .content
                .contains(r#"Parameters: {"hint":"echo"}"#)
        );
    }

    #[tokio::test]
    async fn test_tool_timeout_becomes_failed_step() {
        let tools = MockToolRegistry::new().with_tool(
            cadence_testing::MockTool::new("slow")
                .with_latency(Duration::from_secs(5))
                .with_default_response(json!("late")),
        );
        let engine = engine(ScriptedLlm::new(), tools);
        let step = PlannedStep::new("s1", "wait").with_tool("slow");

        let outcome = engine
            .execute_planned_step(
                &step,
                json!({}),
                &fixtures::tool_agent(["slow"]),
                &CallGuard::with_timeout(Duration::from_millis(20)),
            )
            .await;

        assert!(!outcome.success);
        assert!(outcome.error_message().unwrap().contains("Timed out"));
    }

    #[test]
    fn test_execution_step_record() {
        let outcome = StepOutcome::new(ExecutionMode::SingleShot)
            .succeed("x".repeat(300), Some(json!({"ok": true})));
        let step = outcome.to_execution_step("s1", Utc::now(), json!({}));

        assert!(step.success);
        assert_eq!(step.result, Some(json!({"ok": true})));
        assert_eq!(step.summary.chars().count(), SUMMARY_CHARS + 3);
    }
}
