//! # Mock Tools for Testing
//!
//! Tools that return predictable outcomes so runtime scenarios are
//! reproducible. Every call is recorded for later inspection.

use async_trait::async_trait;
use cadence_core::{ToolInfo, ToolOutcome, ToolRegistry};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::lock;

type Handler = Arc<dyn Fn(&Value) -> ToolOutcome + Send + Sync>;

/// A mock tool that returns predefined outcomes based on its parameters
#[derive(Clone)]
pub struct MockTool {
    name: String,
    description: String,
    responses: Vec<(Value, ToolOutcome)>,
    handler: Option<Handler>,
    default_response: Option<ToolOutcome>,
    latency: Option<Duration>,
    call_history: Arc<Mutex<Vec<Value>>>,
}

impl std::fmt::Debug for MockTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTool")
            .field("name", &self.name)
            .field("responses", &self.responses.len())
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

impl MockTool {
    /// Create a new mock tool with the given name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("Mock tool {}", name),
            name,
            responses: Vec::new(),
            handler: None,
            default_response: None,
            latency: None,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Succeed with `result` when called with exactly `params`
    pub fn with_response(mut self, params: Value, result: Value) -> Self {
        self.responses.push((params, ToolOutcome::success(result)));
        self
    }

    /// Fail with `error` when called with exactly `params`
    pub fn with_failure(mut self, params: Value, error: impl Into<String>) -> Self {
        self.responses.push((params, ToolOutcome::failure(error)));
        self
    }

    /// Compute the outcome from the parameters of unmatched calls
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value) -> ToolOutcome + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Set a default success for any unmatched input
    pub fn with_default_response(mut self, result: Value) -> Self {
        self.default_response = Some(ToolOutcome::success(result));
        self
    }

    /// Set a default failure for any unmatched input
    pub fn with_default_failure(mut self, error: impl Into<String>) -> Self {
        self.default_response = Some(ToolOutcome::failure(error));
        self
    }

    /// Sleep this long before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of times this tool has been called
    pub fn call_count(&self) -> usize {
        lock(&self.call_history).len()
    }

    /// Parameters of every call, oldest first
    pub fn call_history(&self) -> Vec<Value> {
        lock(&self.call_history).clone()
    }

    pub fn was_called_with(&self, params: &Value) -> bool {
        lock(&self.call_history).contains(params)
    }

    pub fn reset(&self) {
        lock(&self.call_history).clear();
    }

    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({"type": "object"}),
        }
    }

    /// Record the call and produce its outcome.
    pub async fn call(&self, params: Value) -> ToolOutcome {
        lock(&self.call_history).push(params.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some((_, outcome)) = self.responses.iter().find(|(p, _)| *p == params) {
            return outcome.clone();
        }
        if let Some(handler) = &self.handler {
            return handler(&params);
        }
        match &self.default_response {
            Some(outcome) => outcome.clone(),
            None => ToolOutcome::success(json!(format!("Mock response for: {}", params))),
        }
    }
}

/// A registry of mock tools for testing scenarios
#[derive(Debug, Clone, Default)]
pub struct MockToolRegistry {
    tools: HashMap<String, Arc<MockTool>>,
}

impl MockToolRegistry {
    /// Create a new empty mock tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mock tool to the registry
    pub fn with_tool(mut self, tool: MockTool) -> Self {
        self.tools.insert(tool.name.clone(), Arc::new(tool));
        self
    }

    /// A tool that echoes its parameters back as the result
    pub fn with_echo_tool(self) -> Self {
        self.with_tool(MockTool::new("echo").with_handler(|params| ToolOutcome::success(params.clone())))
    }

    /// A tool that always succeeds
    pub fn with_success_tool(self, name: impl Into<String>) -> Self {
        self.with_tool(MockTool::new(name).with_default_response(json!("success")))
    }

    /// A tool that always fails
    pub fn with_failure_tool(self, name: impl Into<String>) -> Self {
        self.with_tool(MockTool::new(name).with_default_failure("mock failure"))
    }

    /// A calculator that adds `a` and `b`, answering `{"sum": a + b}`
    pub fn with_calculator(self) -> Self {
        self.with_tool(
            MockTool::new("calculator")
                .with_description("Adds two numbers")
                .with_handler(|params| {
                    let a = params.get("a").and_then(Value::as_f64);
                    let b = params.get("b").and_then(Value::as_f64);
                    match (a, b) {
                        (Some(a), Some(b)) => {
                            let sum = a + b;
                            if sum.fract() == 0.0 && sum.abs() < i64::MAX as f64 {
                                ToolOutcome::success(json!({"sum": sum as i64}))
                            } else {
                                ToolOutcome::success(json!({"sum": sum}))
                            }
                        }
                        _ => ToolOutcome::failure("calculator expects numeric 'a' and 'b'"),
                    }
                }),
        )
    }

    /// A planning tool that always answers with `plan_text`
    pub fn with_planning_tool(self, name: impl Into<String>, plan_text: impl Into<String>) -> Self {
        let plan_text = plan_text.into();
        self.with_tool(MockTool::new(name).with_default_response(Value::String(plan_text)))
    }

    /// A reflection tool that always concludes with `conclusion`
    pub fn with_reflection_tool(self, name: impl Into<String>, conclusion: Value) -> Self {
        self.with_tool(MockTool::new(name).with_default_response(conclusion))
    }

    /// Standard tools: echo, calculator, test_tool and fail_tool
    pub fn with_mock_tools(self) -> Self {
        self.with_echo_tool()
            .with_calculator()
            .with_success_tool("test_tool")
            .with_failure_tool("fail_tool")
    }

    /// Get a handle to a mock tool for inspection
    pub fn get_mock_tool(&self, name: &str) -> Option<Arc<MockTool>> {
        self.tools.get(name).cloned()
    }

    /// Calls made to `name`, zero if unknown
    pub fn calls_to(&self, name: &str) -> usize {
        self.tools.get(name).map_or(0, |t| t.call_count())
    }

    /// Reset all mock tools' call tracking
    pub fn reset_all(&self) {
        for tool in self.tools.values() {
            tool.reset();
        }
    }
}

#[async_trait]
impl ToolRegistry for MockToolRegistry {
    async fn execute_tool(&self, name: &str, params: Value) -> ToolOutcome {
        match self.tools.get(name) {
            Some(tool) => tool.call(params).await,
            None => ToolOutcome::failure(format!("Tool not found: {}", name)),
        }
    }

    async fn get_available_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    async fn get_tool_info(&self, name: &str) -> Option<ToolInfo> {
        self.tools.get(name).map(|t| t.info())
    }
}
