//! # Cadence Core
//!
//! Core types for the Cadence agent runtime: the error taxonomy, the plan and
//! step data model, collaborator traits, runtime configuration, the
//! capability registry and per-session execution memory.

pub mod config;
pub mod error;
pub mod identifiers;
pub mod memory;
pub mod registry;
pub mod traits;
pub mod types;

pub use config::{RuntimeConfig, RuntimeConfigBuilder, RuntimeMode};
pub use error::{
    CadenceResult, ConfigError, ErrorKind, MemoryError, MemoryResult, RegistryError,
    RegistryResult, RuntimeError, SystemError, ToolError,
};
pub use identifiers::ExecutionId;
pub use memory::{ExecutionMemory, ExecutionState, MemoryStats, WorkingMemory};
pub use registry::{
    CapabilityRegistry, Component, ComponentInstance, ComponentMetadata, ComponentMetrics,
    ComponentPath, ComponentStatus,
};
pub use traits::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, ContextIntelligence,
    ExecutionInsights, LearningRecord, LlmHandler, PruneReport, SystemPromptService, TokenUsage,
    ToolInfo, ToolOutcome, ToolRegistry,
};
pub use types::{
    AgentConfig, Assessment, ErrorRecord, ExecutionPlan, ExecutionStatus, ExecutionStep, Insight,
    ModelConfig, PlannedStep, Reflection, SuggestedAction, TOOL_NONE, TOOL_TBD, ToolInvocation,
};
