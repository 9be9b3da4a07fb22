//! Agent fixtures, a static prompt service and plan builders.

use cadence_core::{AgentConfig, ModelConfig, SystemPromptService};
use serde_json::{Value, json};

/// Prompt service returning a fixed prompt, suffixed when tools are available.
#[derive(Debug, Clone)]
pub struct StaticPromptService {
    prompt: String,
}

impl Default for StaticPromptService {
    fn default() -> Self {
        Self::new("You are a test agent.")
    }
}

impl StaticPromptService {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl SystemPromptService for StaticPromptService {
    fn generate_system_prompt(&self, agent: &AgentConfig, has_tools: bool) -> String {
        if has_tools {
            format!("{} Agent {} may use: {}.", self.prompt, agent.name, agent.tools.join(", "))
        } else {
            format!("{} Agent {} has no tools.", self.prompt, agent.name)
        }
    }
}

/// An agent with no tools.
pub fn plain_agent() -> AgentConfig {
    AgentConfig::new("agent-plain", "Plain").with_model(ModelConfig {
        model: "test-model".to_string(),
        ..ModelConfig::default()
    })
}

/// An agent allowed to use `tools`.
pub fn tool_agent<I, S>(tools: I) -> AgentConfig
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tools
        .into_iter()
        .fold(AgentConfig::new("agent-tools", "Toolsmith"), |agent, tool| {
            agent.with_tool(tool)
        })
        .with_model(ModelConfig {
            model: "test-model".to_string(),
            ..ModelConfig::default()
        })
}

/// The wire answer selecting `tool` with `parameters`.
pub fn tool_call(tool: &str, parameters: Value) -> String {
    json!({"tool_name": tool, "parameters": parameters}).to_string()
}

/// The wire answer selecting no tool.
pub fn final_answer(response: &str) -> String {
    json!({"tool_name": "none", "response": response}).to_string()
}

/// Plan text as a planning tool would return it: `{"steps": [...]}`.
pub fn plan_text(steps: Vec<Value>) -> String {
    json!({"steps": steps}).to_string()
}

/// One plan step object.
pub fn plan_step(description: &str, tool: &str, parameters: Value) -> Value {
    json!({
        "description": description,
        "tool_name": tool,
        "parameters": parameters,
    })
}
