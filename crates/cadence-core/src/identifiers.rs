//! Identifier newtypes.
//!
//! Execution ids double as session ids: every `execute()` call owns exactly
//! one session, keyed by the id generated for it.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a single `execute()` call and its isolated session state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    /// Generate a fresh, unique execution id.
    pub fn generate() -> Self {
        Self(format!("exec-{}", Uuid::new_v4()))
    }

    /// Wrap an existing id (e.g. one echoed back by a caller).
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExecutionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generate a prefixed short id for plans, conversations and steps.
pub fn prefixed_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}
