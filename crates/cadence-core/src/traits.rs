//! Collaborator interfaces.
//!
//! The runtime consumes tools, the LLM transport, the context-intelligence
//! subsystem and system-prompt templating only through these narrow traits.
//! Implementations are injected as `Arc<dyn Trait>` at construction time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CadenceResult;
use crate::types::{AgentConfig, ModelConfig};

// ============================================================================
// LLM
// ============================================================================

/// Role of a chat message sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A chat message sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model_config: ModelConfig,
    /// The caller will parse the response as a single JSON object
    pub expects_json_response: bool,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// LLM transport.
///
/// Implementations report transport failures and empty completions as
/// [`RuntimeError::Llm`](crate::error::RuntimeError::Llm).
#[async_trait]
pub trait LlmHandler: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> CadenceResult<CompletionResponse>;
}

// ============================================================================
// Tools
// ============================================================================

/// Outcome of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn success(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Descriptive metadata for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
}

/// Registry of concrete tool implementations.
///
/// Unknown tools and handler panics/errors are reported through
/// [`ToolOutcome::failure`], never as a returned error.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    async fn execute_tool(&self, name: &str, params: Value) -> ToolOutcome;

    async fn get_available_tools(&self) -> Vec<String>;

    async fn get_tool_info(&self, name: &str) -> Option<ToolInfo>;
}

// ============================================================================
// Context intelligence
// ============================================================================

/// A single execution the context-intelligence subsystem can learn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningRecord {
    pub session_id: String,
    pub tool_name: String,
    pub success: bool,
    pub duration_ms: u64,
    /// Free-form context: step id, description, error
    #[serde(default)]
    pub context: Value,
}

/// Result of pruning a session's stored context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub pruned_entries: usize,
}

/// Aggregate insight over a session's executions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionInsights {
    pub total_executions: usize,
    pub success_rate: f64,
    pub avg_execution_time_ms: f64,
}

/// Context-intelligence subsystem.
#[async_trait]
pub trait ContextIntelligence: Send + Sync {
    async fn learn_from_execution(&self, record: LearningRecord) -> CadenceResult<()>;

    async fn prune_context(&self, session_id: &str) -> CadenceResult<PruneReport>;

    async fn get_insights(&self, session_id: &str) -> CadenceResult<ExecutionInsights>;
}

// ============================================================================
// System prompts
// ============================================================================

/// System-prompt templating.
pub trait SystemPromptService: Send + Sync {
    fn generate_system_prompt(&self, agent: &AgentConfig, has_tools: bool) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_outcome_constructors() {
        let ok = ToolOutcome::success(json!({"sum": 5}));
        assert!(ok.success);
        assert_eq!(ok.result, Some(json!({"sum": 5})));
        assert!(ok.error.is_none());

        let err = ToolOutcome::failure("division by zero");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("division by zero"));
    }

    #[test]
    fn test_chat_message_roles() {
        assert_eq!(ChatMessage::system("s").role, ChatRole::System);
        assert_eq!(ChatMessage::user("u").role, ChatRole::User);
        assert_eq!(ChatMessage::assistant("a").role, ChatRole::Assistant);
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
        };
        assert_eq!(usage.total(), 15);
    }

    // Trait object safety checks
    #[test]
    fn test_traits_are_object_safe() {
        fn _llm(_: &dyn LlmHandler) {}
        fn _tools(_: &dyn ToolRegistry) {}
        fn _intelligence(_: &dyn ContextIntelligence) {}
        fn _prompts(_: &dyn SystemPromptService) {}
    }
}
