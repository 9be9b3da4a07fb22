//! Context Manager
//!
//! Owns one session's [`ExecutionMemory`] behind a shared handle and drives
//! the optional context-intelligence collaborator: learning after each step,
//! periodic pruning, and insight refresh. Collaborator failures are logged
//! and recorded in the session's error history; they never propagate.

use cadence_core::{
    ContextIntelligence, ErrorKind, ErrorRecord, ExecutionMemory, ExecutionPlan, ExecutionState,
    ExecutionStatus, ExecutionStep, Insight, LearningRecord, PruneReport, Reflection,
    RuntimeError, TOOL_NONE,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::guard::CallGuard;

/// Insight type produced by [`ContextManager::refresh_insights`].
pub const PERFORMANCE_INSIGHT: &str = "performance";

/// Session memory plus the context-intelligence hooks around it.
pub struct ContextManager {
    memory: Arc<Mutex<ExecutionMemory>>,
    intelligence: Option<Arc<dyn ContextIntelligence>>,
    prune_interval_steps: usize,
    recorded_steps: AtomicUsize,
    session_id: String,
}

impl std::fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextManager")
            .field("session_id", &self.session_id)
            .field("has_intelligence", &self.intelligence.is_some())
            .field("prune_interval_steps", &self.prune_interval_steps)
            .finish_non_exhaustive()
    }
}

impl ContextManager {
    pub fn new(
        memory: ExecutionMemory,
        intelligence: Option<Arc<dyn ContextIntelligence>>,
        prune_interval_steps: usize,
    ) -> Self {
        let session_id = memory.session_id().to_string();
        Self {
            memory: Arc::new(Mutex::new(memory)),
            intelligence,
            prune_interval_steps,
            recorded_steps: AtomicUsize::new(0),
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Shared handle to the session memory.
    pub fn memory(&self) -> Arc<Mutex<ExecutionMemory>> {
        Arc::clone(&self.memory)
    }

    pub async fn set_plan(&self, plan: ExecutionPlan) {
        self.memory.lock().await.set_plan(plan);
    }

    pub async fn set_status(&self, status: ExecutionStatus) {
        self.memory.lock().await.set_status(status);
    }

    pub async fn status(&self) -> ExecutionStatus {
        self.memory.lock().await.status()
    }

    pub async fn add_reflection(&self, reflection: Reflection) {
        self.memory.lock().await.add_reflection(reflection);
    }

    pub async fn record_error(&self, error: &RuntimeError, step_id: Option<&str>) {
        let mut record = ErrorRecord::new(error.kind(), error.to_string());
        if let Some(step_id) = step_id {
            record = record.for_step(step_id);
        }
        self.memory.lock().await.add_error(record);
    }

    pub async fn insights(&self) -> Vec<Insight> {
        self.memory.lock().await.insights().cloned().collect()
    }

    pub async fn snapshot(&self) -> ExecutionState {
        self.memory.lock().await.to_execution_state()
    }

    pub async fn working_memory_bytes(&self) -> usize {
        self.memory.lock().await.memory_stats().total_bytes
    }

    /// Output of the 1-indexed plan step `index`.
    ///
    /// Falls back to the history record when the working-memory copy was
    /// evicted.
    pub async fn step_output(&self, index: usize) -> Option<Value> {
        let memory = self.memory.lock().await;
        if let Some(value) = memory.step_result(index) {
            return Some(value.clone());
        }
        let step_id = &memory.plan()?.steps.get(index.checked_sub(1)?)?.id;
        memory
            .history()
            .iter()
            .rev()
            .find(|step| &step.step_id == step_id && step.success)
            .and_then(|step| step.result.clone())
    }

    /// Record a finished step as the output of plan step `index` (1-indexed).
    pub async fn record_step(&self, index: usize, step: ExecutionStep, guard: &CallGuard) {
        {
            let mut memory = self.memory.lock().await;
            if let (true, Some(result)) = (step.success, step.result.as_ref()) {
                if let Err(e) = memory.store_step_result(index, result) {
                    warn!(session = %self.session_id, step = %step.step_id, error = %e, "Step result not kept in working memory");
                    memory.add_error(
                        ErrorRecord::new(ErrorKind::System, e.to_string()).for_step(&step.step_id),
                    );
                }
            }
            memory.add_execution_step(step.clone());
        }

        if let Some(intelligence) = &self.intelligence {
            let record = LearningRecord {
                session_id: self.session_id.clone(),
                tool_name: step.tool_used.clone().unwrap_or_else(|| TOOL_NONE.to_string()),
                success: step.success,
                duration_ms: step.duration_ms,
                context: json!({
                    "step_id": step.step_id,
                    "summary": step.summary,
                    "error": step.error,
                }),
            };
            let learned = guard
                .run_result("learn_from_execution", intelligence.learn_from_execution(record))
                .await;
            if let Err(e) = learned {
                self.collaborator_failed("learn_from_execution", &e).await;
            }
        }

        let recorded = self.recorded_steps.fetch_add(1, Ordering::Relaxed) + 1;
        if self.prune_interval_steps > 0 && recorded % self.prune_interval_steps == 0 {
            self.prune(guard).await;
        }
    }

    /// Ask the collaborator to prune, then run a local eviction pass.
    pub async fn prune(&self, guard: &CallGuard) -> Option<PruneReport> {
        let intelligence = self.intelligence.as_ref()?;
        let report = match guard
            .run_result("prune_context", intelligence.prune_context(&self.session_id))
            .await
        {
            Ok(report) => report,
            Err(e) => {
                self.collaborator_failed("prune_context", &e).await;
                return None;
            }
        };

        let evicted = self.memory.lock().await.cleanup_memory();
        debug!(
            session = %self.session_id,
            pruned = report.pruned_entries,
            evicted = evicted.len(),
            "Context pruned"
        );
        Some(report)
    }

    /// Turn the collaborator's aggregate view into a performance insight.
    pub async fn refresh_insights(&self, guard: &CallGuard) -> Option<Insight> {
        let intelligence = self.intelligence.as_ref()?;
        let insights = match guard
            .run_result("get_insights", intelligence.get_insights(&self.session_id))
            .await
        {
            Ok(insights) => insights,
            Err(e) => {
                self.collaborator_failed("get_insights", &e).await;
                return None;
            }
        };
        if insights.total_executions == 0 {
            return None;
        }

        let insight = Insight::new(
            PERFORMANCE_INSIGHT,
            format!(
                "{} executions, {:.0}% successful, {:.0}ms average",
                insights.total_executions,
                insights.success_rate * 100.0,
                insights.avg_execution_time_ms
            ),
        );
        self.memory.lock().await.add_insight(insight.clone());
        Some(insight)
    }

    async fn collaborator_failed(&self, operation: &str, error: &RuntimeError) {
        warn!(session = %self.session_id, operation, error = %error, "Context intelligence call failed");
        self.memory
            .lock()
            .await
            .add_error(ErrorRecord::new(error.kind(), format!("{}: {}", operation, error)));
    }
}
