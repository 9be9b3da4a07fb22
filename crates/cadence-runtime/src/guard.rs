//! Suspension-point guard.
//!
//! Every LLM completion, tool invocation and context-intelligence call is
//! raced against the configured call timeout and the session's cancellation
//! token.

use cadence_core::{CadenceResult, RuntimeError};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Deadline and cancellation token applied to one session's awaits.
#[derive(Debug, Clone)]
pub struct CallGuard {
    timeout: Duration,
    token: CancellationToken,
}

impl CallGuard {
    pub fn new(timeout: Duration, token: CancellationToken) -> Self {
        Self { timeout, token }
    }

    /// A guard with its own, never-cancelled token.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, CancellationToken::new())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail fast if the session was cancelled.
    pub fn check(&self, operation: &str) -> CadenceResult<()> {
        if self.token.is_cancelled() {
            return Err(RuntimeError::Cancelled(operation.to_string()));
        }
        Ok(())
    }

    /// Await `future` unless the deadline passes or the token fires first.
    pub async fn run<F, T>(&self, operation: &str, future: F) -> CadenceResult<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                debug!(operation = %operation, "Suspension point cancelled");
                Err(RuntimeError::Cancelled(operation.to_string()))
            }
            outcome = tokio::time::timeout(self.timeout, future) => {
                outcome.map_err(|_| RuntimeError::Timeout {
                    operation: operation.to_string(),
                    duration_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Like [`run`](Self::run) for futures that already return a result.
    pub async fn run_result<F, T>(&self, operation: &str, future: F) -> CadenceResult<T>
    where
        F: Future<Output = CadenceResult<T>>,
    {
        self.run(operation, future).await?
    }
}
