//! Property-Based Tests for Memory Accounting, Data Flow and Metrics
//!
//! These tests check invariants that must hold for any input: working
//! memory byte accounting, type preservation of step-output placeholders,
//! and the running averages kept for registered components.

use cadence_core::{
    CapabilityRegistry, Component, ComponentMetadata, ComponentMetrics, ExecutionId,
    ExecutionMemory, Insight, WorkingMemory,
};
use cadence_runtime::{analyze_task, resolve_placeholders};
use cadence_testing::fixtures;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;

struct Noop;

#[async_trait::async_trait]
impl Component for Noop {}

// Strategy for working-memory keys drawn from a small pool so writes collide
fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (1usize..6).prop_map(WorkingMemory::step_key),
        "[a-z]{1,4}".prop_map(|s| format!("note_{s}")),
    ]
}

// Strategy for JSON leaf values
fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[ -~]{0,64}".prop_map(Value::from),
        prop::collection::vec(any::<i32>(), 0..8).prop_map(|v| json!(v)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_working_memory_bytes_match_entries(
        writes in prop::collection::vec((key_strategy(), value_strategy()), 1..40)
    ) {
        let mut memory = WorkingMemory::new(1024 * 1024, 1.0);
        for (key, value) in &writes {
            memory.set(key.clone(), value.clone()).unwrap();
        }
        prop_assert_eq!(memory.stats().entries, memory.len());

        // Releasing every entry accounts for every stored byte
        let total = memory.total_bytes();
        let keys: Vec<String> = memory.snapshot().into_keys().collect();
        let released: usize = keys.iter().filter_map(|k| memory.remove(k)).sum();
        prop_assert_eq!(released, total);
        prop_assert_eq!(memory.total_bytes(), 0);
        prop_assert!(memory.is_empty());
    }

    #[test]
    fn prop_cleanup_never_touches_other_keys(count in 1usize..30) {
        let mut memory = WorkingMemory::new(1024 * 1024, 1.0);
        memory.set("agent_notes", json!("keep")).unwrap();
        for i in 1..=count {
            memory.set(WorkingMemory::step_key(i), json!(i)).unwrap();
        }

        let evicted = memory.cleanup();
        prop_assert_eq!(evicted.len(), count.div_ceil(4));
        prop_assert!(memory.contains("agent_notes"));
        prop_assert_eq!(memory.len(), 1 + count - evicted.len());
    }

    #[test]
    fn prop_full_placeholder_preserves_json_type(value in value_strategy()) {
        let step_output = json!({"field": value.clone()});
        let resolved = resolve_placeholders(
            &json!({"x": "{{step_1_output.field}}"}),
            |n| (n == 1).then(|| step_output.clone()),
        );
        prop_assert_eq!(&resolved.value["x"], &value);
        prop_assert!(resolved.unresolved.is_empty());
    }

    #[test]
    fn prop_embedded_placeholder_renders_numbers(n in any::<i64>()) {
        let resolved = resolve_placeholders(
            &json!("total: {{step_1_output}} items"),
            |_| Some(json!(n)),
        );
        prop_assert_eq!(resolved.value, json!(format!("total: {} items", n)));
    }

    #[test]
    fn prop_missing_steps_leave_text_verbatim(index in 2usize..50, text in "[a-z ]{0,20}") {
        let input = json!(format!("{}{{{{step_{}_output}}}}", text, index));
        let resolved = resolve_placeholders(&input, |n| (n == 1).then(|| json!(1)));
        prop_assert_eq!(resolved.value, input);
        prop_assert_eq!(resolved.unresolved.len(), 1);
    }

    #[test]
    fn prop_running_averages_match_observations(
        observations in prop::collection::vec((0.0f64..10_000.0, any::<bool>()), 1..50)
    ) {
        let mut metrics = ComponentMetrics::default();
        for (latency, success) in &observations {
            metrics.record(*latency, *success);
        }

        let n = observations.len() as f64;
        let mean = observations.iter().map(|(l, _)| l).sum::<f64>() / n;
        let rate = observations.iter().filter(|(_, s)| *s).count() as f64 / n;

        prop_assert_eq!(metrics.usage_count, observations.len() as u64);
        prop_assert!((metrics.average_latency - mean).abs() < 1e-6);
        prop_assert!((metrics.success_rate - rate).abs() < 1e-9);
    }

    #[test]
    fn prop_insight_history_is_bounded(count in 1usize..250) {
        let mut memory = ExecutionMemory::new(
            ExecutionId::from_string("exec-prop"),
            fixtures::plain_agent(),
        );
        for i in 0..count {
            memory.add_insight(Insight::new("pattern", format!("observation {i}")));
        }
        prop_assert_eq!(memory.insights().len(), count.min(100));
    }

    #[test]
    fn prop_sequencing_keywords_always_plan(prefix in "[a-z ]{0,40}", suffix in "[a-z ]{0,40}") {
        let task = format!("{prefix} then {suffix}");
        prop_assert!(analyze_task(&task).requires_planning);
    }

    #[test]
    fn prop_registration_attempts_never_duplicate_providers(
        ids in prop::collection::vec("[a-d]", 1..20)
    ) {
        tokio_test::block_on(async {
            let registry = CapabilityRegistry::new();
            let mut accepted = std::collections::BTreeSet::new();
            for id in &ids {
                let metadata = ComponentMetadata::new(id.clone()).with_capability("search");
                let registered = registry.register(metadata, Arc::new(Noop)).await.is_ok();
                prop_assert_eq!(registered, accepted.insert(id.clone()));
            }
            prop_assert_eq!(registry.providers_of("search").await, accepted.clone());
            prop_assert_eq!(registry.len().await, accepted.len());
            Ok(())
        })?;
    }
}
