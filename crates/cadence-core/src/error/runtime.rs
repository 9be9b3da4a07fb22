//! Runtime error taxonomy.
//!
//! `RuntimeError` covers the failure kinds the orchestrator distinguishes:
//! LLM failures, tool failures, malformed model output, planning failures,
//! conversation state errors and system-level errors, plus the timeout and
//! cancellation outcomes of a guarded suspension point.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by tool lookup and execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// The tool registry does not know this tool.
    #[error("Tool '{tool}' not found in registry")]
    NotFound {
        /// Requested tool name
        tool: String,
    },

    /// The model selected a tool the agent is not configured to use.
    #[error("Tool '{tool}' is not available to agent '{agent}'")]
    NotPermitted {
        /// Requested tool name
        tool: String,
        /// Agent that made the selection
        agent: String,
    },

    /// The tool handler reported a failure.
    #[error("Tool '{tool}' execution failed: {message}")]
    ExecutionFailed {
        /// Tool name
        tool: String,
        /// Failure reported by the handler
        message: String,
    },
}

impl ToolError {
    /// Name of the tool involved in the failure.
    pub fn tool_name(&self) -> &str {
        match self {
            ToolError::NotFound { tool }
            | ToolError::NotPermitted { tool, .. }
            | ToolError::ExecutionFailed { tool, .. } => tool,
        }
    }
}

/// System-level errors: the only errors allowed to escape `execute()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SystemError {
    /// The orchestrator has not completed initialization (or was shut down).
    #[error("Runtime is not ready (state: {state})")]
    NotReady {
        /// Observed orchestrator state
        state: String,
    },

    /// A required collaborator was not supplied.
    #[error("Missing required dependency: {0}")]
    MissingDependency(&'static str),

    /// The orchestrator is shutting down.
    #[error("Runtime is shutting down")]
    ShuttingDown,

    /// A collaborator failed during initialization.
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}

/// Coarse error classification used in error history records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Llm,
    Tool,
    Validation,
    Planning,
    Conversation,
    System,
    Timeout,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Llm => "llm",
            ErrorKind::Tool => "tool",
            ErrorKind::Validation => "validation",
            ErrorKind::Planning => "planning",
            ErrorKind::Conversation => "conversation",
            ErrorKind::System => "system",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Top-level runtime error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Empty or failed completion.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Unknown tool or handler failure.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Malformed plan or model output.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The planner could not produce an executable plan.
    #[error("Planning failed: {0}")]
    Planning(String),

    /// Invalid conversation state transition or summarization failure.
    #[error("Conversation error: {0}")]
    Conversation(String),

    /// Not-initialized, missing dependency, shutdown.
    #[error(transparent)]
    System(#[from] SystemError),

    /// A suspension point exceeded its deadline.
    #[error("Timed out after {duration_ms}ms waiting for {operation}")]
    Timeout {
        /// What was being awaited
        operation: String,
        /// Deadline in milliseconds
        duration_ms: u64,
    },

    /// The session's cancellation token fired.
    #[error("Execution cancelled: {0}")]
    Cancelled(String),
}

impl RuntimeError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Llm(_) => ErrorKind::Llm,
            RuntimeError::Tool(_) => ErrorKind::Tool,
            RuntimeError::Validation(_) => ErrorKind::Validation,
            RuntimeError::Planning(_) => ErrorKind::Planning,
            RuntimeError::Conversation(_) => ErrorKind::Conversation,
            RuntimeError::System(_) => ErrorKind::System,
            RuntimeError::Timeout { .. } => ErrorKind::Timeout,
            RuntimeError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RuntimeError::Llm(_) | RuntimeError::Timeout { .. } | RuntimeError::Tool(ToolError::ExecutionFailed { .. })
        )
    }

    /// Whether this is a system-level error.
    pub fn is_system(&self) -> bool {
        matches!(self, RuntimeError::System(_))
    }

    /// Get the error code suitable for logging or reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            RuntimeError::Llm(_) => "LLM_ERROR",
            RuntimeError::Tool(ToolError::NotFound { .. }) => "TOOL_NOT_FOUND",
            RuntimeError::Tool(ToolError::NotPermitted { .. }) => "TOOL_NOT_PERMITTED",
            RuntimeError::Tool(ToolError::ExecutionFailed { .. }) => "TOOL_EXECUTION_FAILED",
            RuntimeError::Validation(_) => "VALIDATION_ERROR",
            RuntimeError::Planning(_) => "PLANNING_FAILURE",
            RuntimeError::Conversation(_) => "CONVERSATION_ERROR",
            RuntimeError::System(SystemError::NotReady { .. }) => "RUNTIME_NOT_READY",
            RuntimeError::System(SystemError::MissingDependency(_)) => "MISSING_DEPENDENCY",
            RuntimeError::System(SystemError::ShuttingDown) => "SHUTTING_DOWN",
            RuntimeError::System(SystemError::InitializationFailed(_)) => "INITIALIZATION_FAILED",
            RuntimeError::Timeout { .. } => "TIMEOUT",
            RuntimeError::Cancelled(_) => "CANCELLED",
        }
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::Validation(format!("invalid JSON: {}", err))
    }
}

/// Result type for runtime operations.
pub type CadenceResult<T> = Result<T, RuntimeError>;
