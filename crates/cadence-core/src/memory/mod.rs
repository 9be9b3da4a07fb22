//! Execution Memory
//!
//! Per-session mutable state: the current plan, the append-only step history,
//! size-tracked working memory, and capped insight and error logs. Each
//! `execute()` call owns exactly one [`ExecutionMemory`]; consumers outside
//! the session only ever see an [`ExecutionState`] snapshot.

mod working;

pub use working::{MemoryStats, STEP_RESULT_PREFIX, WorkingMemory};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::identifiers::ExecutionId;
use crate::types::{
    AgentConfig, ErrorRecord, ExecutionPlan, ExecutionStatus, ExecutionStep, Insight, Reflection,
};

/// Maximum number of insights retained per session.
pub const MAX_INSIGHTS: usize = 100;

/// Maximum number of error records retained per session.
pub const MAX_ERRORS: usize = 50;

/// Identical insights inside this window are stored once.
pub const INSIGHT_DEDUP_WINDOW_SECS: i64 = 60;

/// Mutable state of one session.
#[derive(Debug, Clone)]
pub struct ExecutionMemory {
    session_id: ExecutionId,
    agent: AgentConfig,
    plan: Option<ExecutionPlan>,
    history: Vec<ExecutionStep>,
    working: WorkingMemory,
    insights: VecDeque<Insight>,
    errors: VecDeque<ErrorRecord>,
    reflections: Vec<Reflection>,
    current_step: usize,
    total_steps: usize,
    status: ExecutionStatus,
    started_at: DateTime<Utc>,
}

impl ExecutionMemory {
    /// Create a session with default working memory limits.
    pub fn new(session_id: ExecutionId, agent: AgentConfig) -> Self {
        Self::with_working_memory(session_id, agent, WorkingMemory::default())
    }

    /// Create a session whose working memory follows `config`.
    pub fn from_config(session_id: ExecutionId, agent: AgentConfig, config: &RuntimeConfig) -> Self {
        Self::with_working_memory(
            session_id,
            agent,
            WorkingMemory::new(
                config.working_memory_limit_bytes,
                config.memory_cleanup_threshold,
            ),
        )
    }

    pub fn with_working_memory(
        session_id: ExecutionId,
        agent: AgentConfig,
        working: WorkingMemory,
    ) -> Self {
        Self {
            session_id,
            agent,
            plan: None,
            history: Vec::new(),
            working,
            insights: VecDeque::new(),
            errors: VecDeque::new(),
            reflections: Vec::new(),
            current_step: 0,
            total_steps: 0,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
        }
    }

    pub fn session_id(&self) -> &ExecutionId {
        &self.session_id
    }

    pub fn agent(&self) -> &AgentConfig {
        &self.agent
    }

    // ------------------------------------------------------------------
    // Working memory
    // ------------------------------------------------------------------

    /// Serialize and store `value` under `key`.
    pub fn set_memory<T: Serialize>(&mut self, key: &str, value: &T) -> MemoryResult<()> {
        let value = serde_json::to_value(value).map_err(|e| MemoryError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        let evicted = self.working.set(key, value)?;
        if !evicted.is_empty() {
            debug!(
                session.id = %self.session_id,
                evicted = ?evicted,
                "Working memory threshold crossed"
            );
        }
        Ok(())
    }

    pub fn get_memory(&self, key: &str) -> Option<&Value> {
        self.working.get(key)
    }

    /// Typed read; `None` when absent or not deserializable as `T`.
    pub fn get_memory_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.working.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(key = %key, error = %e, "Working memory value has unexpected shape");
                None
            }
        }
    }

    /// Remove `key`, returning the bytes released.
    pub fn clear_memory(&mut self, key: &str) -> Option<usize> {
        self.working.remove(key)
    }

    /// Force an eviction pass over step results.
    pub fn cleanup_memory(&mut self) -> Vec<String> {
        self.working.cleanup()
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.working.stats()
    }

    /// Store the output of the 1-indexed step `index`.
    pub fn store_step_result(&mut self, index: usize, value: &Value) -> MemoryResult<()> {
        self.set_memory(&WorkingMemory::step_key(index), value)
    }

    pub fn step_result(&self, index: usize) -> Option<&Value> {
        self.working.get(&WorkingMemory::step_key(index))
    }

    // ------------------------------------------------------------------
    // Plan and history
    // ------------------------------------------------------------------

    pub fn set_plan(&mut self, plan: ExecutionPlan) {
        self.total_steps = plan.len();
        self.plan = Some(plan);
    }

    pub fn plan(&self) -> Option<&ExecutionPlan> {
        self.plan.as_ref()
    }

    pub fn add_execution_step(&mut self, step: ExecutionStep) {
        self.history.push(step);
        self.current_step = self.history.len();
        self.total_steps = self.total_steps.max(self.current_step);
    }

    pub fn history(&self) -> &[ExecutionStep] {
        &self.history
    }

    pub fn last_step(&self) -> Option<&ExecutionStep> {
        self.history.last()
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    // ------------------------------------------------------------------
    // Insights, reflections, errors
    // ------------------------------------------------------------------

    /// Append an insight. Returns `false` if an identical insight was stored
    /// within the dedup window.
    pub fn add_insight(&mut self, insight: Insight) -> bool {
        let window = Duration::seconds(INSIGHT_DEDUP_WINDOW_SECS);
        let duplicate = self.insights.iter().any(|existing| {
            existing.same_content(&insight)
                && (insight.created_at - existing.created_at).abs() < window
        });
        if duplicate {
            return false;
        }

        self.insights.push_back(insight);
        while self.insights.len() > MAX_INSIGHTS {
            self.insights.pop_front();
        }
        true
    }

    pub fn insights(&self) -> impl ExactSizeIterator<Item = &Insight> {
        self.insights.iter()
    }

    pub fn add_reflection(&mut self, reflection: Reflection) {
        self.reflections.push(reflection);
    }

    pub fn reflections(&self) -> &[Reflection] {
        &self.reflections
    }

    pub fn add_error(&mut self, error: ErrorRecord) {
        self.errors.push_back(error);
        while self.errors.len() > MAX_ERRORS {
            self.errors.pop_front();
        }
    }

    pub fn errors(&self) -> impl ExactSizeIterator<Item = &ErrorRecord> {
        self.errors.iter()
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ExecutionStatus) {
        self.status = status;
    }

    /// Abort the session unless it already finished.
    pub fn mark_aborted(&mut self) {
        if !self.status.is_terminal() {
            self.status = ExecutionStatus::Aborted;
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Deep, serializable copy of the session.
    pub fn to_execution_state(&self) -> ExecutionState {
        ExecutionState {
            session_id: self.session_id.clone(),
            agent_id: self.agent.id.clone(),
            plan: self.plan.clone(),
            history: self.history.clone(),
            working_memory: self.working.snapshot(),
            memory_stats: self.working.stats(),
            insights: self.insights.iter().cloned().collect(),
            errors: self.errors.iter().cloned().collect(),
            reflections: self.reflections.clone(),
            current_step: self.current_step,
            total_steps: self.total_steps,
            status: self.status,
            started_at: self.started_at,
        }
    }
}

/// Immutable snapshot of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub session_id: ExecutionId,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ExecutionPlan>,
    pub history: Vec<ExecutionStep>,
    pub working_memory: HashMap<String, Value>,
    pub memory_stats: MemoryStats,
    pub insights: Vec<Insight>,
    pub errors: Vec<ErrorRecord>,
    pub reflections: Vec<Reflection>,
    pub current_step: usize,
    pub total_steps: usize,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::PlannedStep;
    use serde_json::json;

    fn memory() -> ExecutionMemory {
        ExecutionMemory::new(
            ExecutionId::from_string("exec-test"),
            AgentConfig::new("agent-1", "Tester"),
        )
    }

    fn step(id: &str, success: bool) -> ExecutionStep {
        let now = Utc::now();
        ExecutionStep {
            step_id: id.to_string(),
            started_at: now,
            completed_at: now,
            duration_ms: 3,
            success,
            tool_used: Some("calculator".to_string()),
            parameters: json!({}),
            result: Some(json!({"sum": 5})),
            error: None,
            summary: "added numbers".to_string(),
        }
    }

    #[test]
    fn test_set_get_clear_roundtrip() {
        let mut memory = memory();
        let value = json!({"nested": {"list": [1, 2, 3]}, "flag": false});
        memory.set_memory("k", &value).unwrap();

        assert_eq!(memory.get_memory("k"), Some(&value));

        let before = memory.memory_stats().total_bytes;
        let released = memory.clear_memory("k").unwrap();
        assert_eq!(released, serde_json::to_vec(&value).unwrap().len());
        assert_eq!(memory.memory_stats().total_bytes, before - released);
        assert!(memory.get_memory("k").is_none());
    }

    #[test]
    fn test_get_memory_as() {
        let mut memory = memory();
        memory.set_memory("count", &42u32).unwrap();

        assert_eq!(memory.get_memory_as::<u32>("count"), Some(42));
        assert_eq!(memory.get_memory_as::<String>("count"), None);
        assert_eq!(memory.get_memory_as::<u32>("missing"), None);
    }

    #[test]
    fn test_insights_capped_oldest_first() {
        let mut memory = memory();
        for i in 0..=MAX_INSIGHTS {
            assert!(memory.add_insight(Insight::new("pattern", format!("insight {}", i))));
        }

        assert_eq!(memory.insights().len(), MAX_INSIGHTS);
        assert_eq!(
            memory.insights().next().map(|i| i.description.as_str()),
            Some("insight 1")
        );
    }

    #[test]
    fn test_duplicate_insight_within_window_stored_once() {
        let mut memory = memory();
        assert!(memory.add_insight(Insight::new("performance", "tool is slow")));
        assert!(!memory.add_insight(Insight::new("performance", "tool is slow")));
        assert_eq!(memory.insights().len(), 1);
    }

    #[test]
    fn test_duplicate_insight_outside_window_stored_again() {
        let mut memory = memory();
        let mut old = Insight::new("performance", "tool is slow");
        old.created_at = Utc::now() - Duration::seconds(INSIGHT_DEDUP_WINDOW_SECS + 5);
        assert!(memory.add_insight(old));
        assert!(memory.add_insight(Insight::new("performance", "tool is slow")));
        assert_eq!(memory.insights().len(), 2);
    }

    #[test]
    fn test_errors_capped() {
        let mut memory = memory();
        for i in 0..(MAX_ERRORS + 10) {
            memory.add_error(ErrorRecord::new(ErrorKind::Tool, format!("failure {}", i)));
        }

        assert_eq!(memory.errors().len(), MAX_ERRORS);
        assert_eq!(
            memory.errors().next().map(|e| e.message.as_str()),
            Some("failure 10")
        );
    }

    #[test]
    fn test_step_counters() {
        let mut memory = memory();
        memory.set_plan(ExecutionPlan::new(
            "task",
            vec![PlannedStep::new("s1", "one"), PlannedStep::new("s2", "two")],
            0.8,
        ));
        assert_eq!(memory.total_steps(), 2);

        memory.add_execution_step(step("s1", true));
        assert_eq!(memory.current_step(), 1);
        assert_eq!(memory.total_steps(), 2);
        assert_eq!(memory.last_step().map(|s| s.step_id.as_str()), Some("s1"));
    }

    #[test]
    fn test_store_step_result_uses_reserved_prefix() {
        let mut memory = memory();
        memory.store_step_result(1, &json!({"sum": 5})).unwrap();

        assert_eq!(memory.get_memory("step_result_1"), Some(&json!({"sum": 5})));
        assert_eq!(memory.step_result(1), Some(&json!({"sum": 5})));
    }

    #[test]
    fn test_mark_aborted_keeps_terminal_status() {
        let mut memory = memory();
        memory.set_status(ExecutionStatus::Succeeded);
        memory.mark_aborted();
        assert_eq!(memory.status(), ExecutionStatus::Succeeded);

        let mut running = self::memory();
        running.mark_aborted();
        assert_eq!(running.status(), ExecutionStatus::Aborted);
    }

    #[test]
    fn test_snapshot_is_a_deep_copy() {
        let mut memory = memory();
        memory.set_memory("k", &json!([1])).unwrap();
        memory.add_execution_step(step("s1", true));

        let snapshot = memory.to_execution_state();
        memory.set_memory("k", &json!([1, 2])).unwrap();
        memory.add_execution_step(step("s2", false));

        assert_eq!(snapshot.working_memory.get("k"), Some(&json!([1])));
        assert_eq!(snapshot.history.len(), 1);

        let encoded = serde_json::to_string(&snapshot).unwrap();
        let decoded: ExecutionState = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.session_id.as_str(), "exec-test");
    }
}
