//! Error Types
//!
//! Structured errors for every failure mode the runtime distinguishes.
//! Per-step failures (LLM, tool, protocol parsing) are captured into the
//! session's error history and surfaced as failed steps; only
//! [`SystemError`]s escape `initialize()`/`execute()`.
//!
//! The error types are organized into focused submodules:
//! - `runtime`: the top-level taxonomy (`RuntimeError`, `ToolError`, `SystemError`)
//! - `registry`: capability registry failures
//! - `memory`: working memory failures
//! - `config`: configuration loading and validation

mod config;
mod memory;
mod registry;
mod runtime;

pub use config::ConfigError;
pub use memory::{MemoryError, MemoryResult};
pub use registry::{RegistryError, RegistryResult};
pub use runtime::{CadenceResult, ErrorKind, RuntimeError, SystemError, ToolError};
