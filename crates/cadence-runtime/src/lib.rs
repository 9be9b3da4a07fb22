//! # Cadence Runtime
//!
//! The execution pipeline of the Cadence agent runtime. A
//! [`RuntimeOrchestrator`] turns a free-text task into planned or single-shot
//! tool calls driven by an LLM, reflects on failed steps, and closes each
//! session with a summarized conversation and a [`RuntimeResult`].
//!
//! ## Engines
//!
//! - [`PlanningEngine`]: task classification and plan parsing
//! - [`ExecutionEngine`]: the JSON tool-call protocol, single-shot and orchestrated
//! - [`ReflectionEngine`]: post-step critique
//! - [`ConversationEngine`]: turn log, state machine, final summary
//! - [`ContextManager`]: session memory and context-intelligence hooks
//!
//! ## Example
//!
//! ```ignore
//! let runtime = RuntimeOrchestrator::builder()
//!     .llm(llm)
//!     .tools(tools)
//!     .prompts(prompts)
//!     .build()?;
//! runtime.initialize().await?;
//! let result = runtime.execute("Add 2 and 3", &agent).await?;
//! println!("{}", result.response);
//! ```

pub mod context;
pub mod conversation;
pub mod execution;
pub mod guard;
pub mod orchestrator;
pub mod placeholder;
pub mod planning;
pub mod protocol;
pub mod reflection;
pub mod telemetry;

pub use context::ContextManager;
pub use conversation::{Conversation, ConversationEngine, ConversationState, Turn};
pub use execution::{
    ExecutionEngine, ExecutionMode, MAX_ORCHESTRATION_STEPS, StepOutcome, requires_orchestration,
};
pub use guard::CallGuard;
pub use orchestrator::{
    HealthState, RuntimeHealth, RuntimeMetrics, RuntimeOrchestrator, RuntimeOrchestratorBuilder,
    RuntimeResult, SessionSummary,
};
pub use placeholder::{Resolved, resolve_placeholders};
pub use planning::{PlanningEngine, TaskAnalysis, TaskComplexity, analyze_task, parse_plan};
pub use protocol::{ToolDecision, parse_tool_decision};
pub use reflection::ReflectionEngine;
pub use telemetry::{LogFormat, TelemetryConfig, TelemetryError, init_tracing};
