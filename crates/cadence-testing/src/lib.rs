//! # Cadence Testing
//!
//! Test doubles for the collaborator traits the runtime consumes.
//!
//! ## Components
//!
//! - **Scripted LLM**: deterministic completions with request recording
//! - **Mock Tools**: predictable tool implementations with call history
//! - **Recording Intelligence**: in-memory context-intelligence subsystem
//! - **Fixtures**: agents, a static prompt service and wire-format helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cadence_testing::{MockToolRegistry, ScriptedLlm, fixtures};
//!
//! let llm = ScriptedLlm::new().with_replies([
//!     fixtures::tool_call("calculator", json!({"a": 2, "b": 3})),
//! ]);
//! let tools = MockToolRegistry::new().with_calculator();
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod fixtures;
/// Recording context intelligence
pub mod intelligence;
/// Scripted LLM handler
pub mod mock_llm;
/// Mock tools for predictable testing
pub mod mock_tools;

pub use fixtures::StaticPromptService;
pub use intelligence::RecordingIntelligence;
pub use mock_llm::{ScriptedLlm, ScriptedReply};
pub use mock_tools::{MockTool, MockToolRegistry};

/// Lock ignoring poisoning; a panicking test must not cascade into others.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
