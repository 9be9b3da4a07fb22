//! Size-tracked key/value working memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::config::DEFAULT_WORKING_MEMORY_LIMIT;
use crate::error::{MemoryError, MemoryResult};

/// Reserved key prefix for step results; only these keys are evictable.
pub const STEP_RESULT_PREFIX: &str = "step_result_";

/// Fraction of step-result keys evicted by one cleanup pass.
const EVICTION_FRACTION: f64 = 0.25;

const DEFAULT_CLEANUP_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Value,
    size: usize,
    stored_at: DateTime<Utc>,
    sequence: u64,
}

/// Point-in-time usage figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub entries: usize,
    pub total_bytes: usize,
    pub limit_bytes: usize,
    /// `total_bytes / limit_bytes`
    pub utilization: f64,
}

/// Working memory with exact serialized-size accounting.
///
/// `total_bytes` is always the sum of the stored values' serialized JSON
/// lengths. Crossing the cleanup threshold evicts the oldest quarter of the
/// step-result entries.
#[derive(Debug, Clone)]
pub struct WorkingMemory {
    entries: HashMap<String, MemoryEntry>,
    total_bytes: usize,
    limit_bytes: usize,
    cleanup_threshold: f64,
    next_sequence: u64,
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new(DEFAULT_WORKING_MEMORY_LIMIT, DEFAULT_CLEANUP_THRESHOLD)
    }
}

impl WorkingMemory {
    pub fn new(limit_bytes: usize, cleanup_threshold: f64) -> Self {
        Self {
            entries: HashMap::new(),
            total_bytes: 0,
            limit_bytes: limit_bytes.max(1),
            cleanup_threshold,
            next_sequence: 0,
        }
    }

    /// Key under which the result of the 1-indexed step `index` is stored.
    pub fn step_key(index: usize) -> String {
        format!("{}{}", STEP_RESULT_PREFIX, index)
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Returns the keys evicted if the write pushed utilization over the
    /// cleanup threshold.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> MemoryResult<Vec<String>> {
        let key = key.into();
        let size = serialized_size(&key, &value)?;
        if size > self.limit_bytes {
            return Err(MemoryError::ValueTooLarge {
                key,
                size,
                capacity: self.limit_bytes,
            });
        }

        if let Some(old) = self.entries.remove(&key) {
            self.total_bytes -= old.size;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(
            key,
            MemoryEntry {
                value,
                size,
                stored_at: Utc::now(),
                sequence,
            },
        );
        self.total_bytes += size;

        if self.utilization() > self.cleanup_threshold {
            return Ok(self.cleanup());
        }
        Ok(Vec::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Remove `key`, returning the number of bytes released.
    pub fn remove(&mut self, key: &str) -> Option<usize> {
        let entry = self.entries.remove(key)?;
        self.total_bytes -= entry.size;
        Some(entry.size)
    }

    /// Evict the oldest `ceil(0.25 * n)` of the `n` step-result entries.
    pub fn cleanup(&mut self) -> Vec<String> {
        let mut step_keys: Vec<(DateTime<Utc>, u64, String)> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(STEP_RESULT_PREFIX))
            .map(|(key, e)| (e.stored_at, e.sequence, key.clone()))
            .collect();
        if step_keys.is_empty() {
            return Vec::new();
        }

        step_keys.sort();
        let evict = (step_keys.len() as f64 * EVICTION_FRACTION).ceil() as usize;

        let evicted: Vec<String> = step_keys
            .into_iter()
            .take(evict)
            .map(|(_, _, key)| key)
            .collect();
        for key in &evicted {
            self.remove(key);
        }

        debug!(
            evicted = evicted.len(),
            total_bytes = self.total_bytes,
            "Working memory cleanup"
        );
        evicted
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn utilization(&self) -> f64 {
        self.total_bytes as f64 / self.limit_bytes as f64
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            entries: self.entries.len(),
            total_bytes: self.total_bytes,
            limit_bytes: self.limit_bytes,
            utilization: self.utilization(),
        }
    }

    /// Deep copy of every stored value.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.entries
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }
}

fn serialized_size(key: &str, value: &Value) -> MemoryResult<usize> {
    serde_json::to_vec(value)
        .map(|bytes| bytes.len())
        .map_err(|e| MemoryError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_size_tracks_overwrite_and_remove() {
        let mut memory = WorkingMemory::default();
        memory.set("a", json!("hello")).unwrap();
        assert_eq!(memory.total_bytes(), 7);

        memory.set("a", json!([1, 2, 3])).unwrap();
        assert_eq!(memory.total_bytes(), 7);

        memory.set("b", json!({"k": true})).unwrap();
        assert_eq!(memory.total_bytes(), 7 + 10);

        assert_eq!(memory.remove("a"), Some(7));
        assert_eq!(memory.total_bytes(), 10);
        assert_eq!(memory.remove("a"), None);
    }

    #[test]
    fn test_value_larger_than_limit_is_rejected() {
        let mut memory = WorkingMemory::new(8, 0.8);
        let err = memory.set("big", json!("this does not fit")).unwrap_err();

        assert!(matches!(err, MemoryError::ValueTooLarge { size: 19, capacity: 8, .. }));
        assert!(memory.is_empty());
        assert_eq!(memory.total_bytes(), 0);
    }

    #[test]
    fn test_crossing_threshold_evicts_oldest_quarter_of_step_results() {
        let mut memory = WorkingMemory::new(1000, 0.8);
        for i in 1..=6 {
            let evicted = memory.set(WorkingMemory::step_key(i), json!(i)).unwrap();
            assert!(evicted.is_empty());
        }

        let filler = "x".repeat(800);
        let evicted = memory.set("notes", json!(filler)).unwrap();

        // ceil(0.25 * 6) = 2
        assert_eq!(evicted, vec!["step_result_1", "step_result_2"]);
        assert!(memory.contains("notes"));
        assert!(memory.contains("step_result_3"));
        assert_eq!(memory.len(), 5);
    }

    #[test]
    fn test_cleanup_without_step_results_is_noop() {
        let mut memory = WorkingMemory::default();
        memory.set("plain", json!(1)).unwrap();
        assert!(memory.cleanup().is_empty());
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_stats() {
        let mut memory = WorkingMemory::new(100, 0.9);
        memory.set("k", json!("0123456789012345678")).unwrap();
        let stats = memory.stats();

        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_bytes, 21);
        assert_eq!(stats.limit_bytes, 100);
        assert!((stats.utilization - 0.21).abs() < 1e-9);
    }
}
