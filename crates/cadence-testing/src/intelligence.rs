//! Recording context-intelligence double.

use async_trait::async_trait;
use cadence_core::{
    CadenceResult, ContextIntelligence, ExecutionInsights, LearningRecord, PruneReport,
    RuntimeError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::lock;

/// Keeps every learning record in memory and derives insights from them.
#[derive(Debug, Clone, Default)]
pub struct RecordingIntelligence {
    records: Arc<Mutex<Vec<LearningRecord>>>,
    prunes: Arc<Mutex<HashMap<String, usize>>>,
    failing: bool,
}

impl RecordingIntelligence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation returns an error.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<LearningRecord> {
        lock(&self.records).clone()
    }

    pub fn records_for(&self, session_id: &str) -> Vec<LearningRecord> {
        lock(&self.records)
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Number of prune requests received for `session_id`.
    pub fn prune_count(&self, session_id: &str) -> usize {
        lock(&self.prunes).get(session_id).copied().unwrap_or(0)
    }

    fn check(&self, operation: &str) -> CadenceResult<()> {
        if self.failing {
            return Err(RuntimeError::Validation(format!(
                "context intelligence unavailable: {}",
                operation
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ContextIntelligence for RecordingIntelligence {
    async fn learn_from_execution(&self, record: LearningRecord) -> CadenceResult<()> {
        self.check("learn")?;
        lock(&self.records).push(record);
        Ok(())
    }

    async fn prune_context(&self, session_id: &str) -> CadenceResult<PruneReport> {
        self.check("prune")?;
        *lock(&self.prunes).entry(session_id.to_string()).or_default() += 1;
        Ok(PruneReport { pruned_entries: 0 })
    }

    async fn get_insights(&self, session_id: &str) -> CadenceResult<ExecutionInsights> {
        self.check("insights")?;
        let records = self.records_for(session_id);
        if records.is_empty() {
            return Ok(ExecutionInsights::default());
        }

        let total = records.len();
        let succeeded = records.iter().filter(|r| r.success).count();
        let total_ms: u64 = records.iter().map(|r| r.duration_ms).sum();
        Ok(ExecutionInsights {
            total_executions: total,
            success_rate: succeeded as f64 / total as f64,
            avg_execution_time_ms: total_ms as f64 / total as f64,
        })
    }
}
