//! # Cadence
//!
//! A capability-routed agent runtime. Cadence turns a free-text task into a
//! bounded sequence of tool invocations mediated by a language model, with
//! multi-step planning, reflective self-correction and per-session working
//! memory.
//!
//! This crate re-exports the workspace:
//!
//! - [`core`]: errors, data model, collaborator traits, configuration,
//!   capability registry and execution memory
//! - [`runtime`]: the engines and the [`RuntimeOrchestrator`]
//! - `testing` (feature `testing`): scripted LLM, mock tools and fixtures

pub use cadence_core as core;
pub use cadence_runtime as runtime;

#[cfg(feature = "testing")]
pub use cadence_testing as testing;

pub use cadence_core::{
    AgentConfig, CadenceResult, CapabilityRegistry, ComponentMetadata, ContextIntelligence,
    ExecutionMemory, ExecutionPlan, ExecutionStatus, ExecutionStep, LlmHandler, ModelConfig,
    PlannedStep, RuntimeConfig, RuntimeConfigBuilder, RuntimeError, RuntimeMode, SystemError,
    SystemPromptService, ToolOutcome, ToolRegistry,
};
pub use cadence_runtime::{
    RuntimeHealth, RuntimeMetrics, RuntimeOrchestrator, RuntimeResult, TelemetryConfig,
    init_tracing,
};
