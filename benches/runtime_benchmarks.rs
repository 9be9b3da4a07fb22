//! Runtime Performance Benchmarks
//!
//! Benchmarks the hot paths of a session:
//! - Capability path search, cached and after invalidation
//! - Working memory writes with eviction pressure
//! - Placeholder resolution over step outputs
//! - A complete single-shot `execute()` with scripted collaborators

use cadence_core::{CapabilityRegistry, Component, ComponentMetadata, WorkingMemory};
use cadence_runtime::{RuntimeOrchestrator, resolve_placeholders};
use cadence_testing::{MockToolRegistry, ScriptedLlm, StaticPromptService, fixtures};
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

struct Stage;

#[async_trait::async_trait]
impl Component for Stage {}

/// A chain `stage_0 -> stage_1 -> ... -> stage_{len-1}` where stage `i`
/// provides `cap_{i+1}` and requires `cap_i`.
async fn chain_registry(len: usize) -> CapabilityRegistry {
    let registry = CapabilityRegistry::new();
    for i in 0..len {
        let mut metadata = ComponentMetadata::new(format!("stage_{i}"))
            .with_capability(format!("cap_{}", i + 1))
            .with_average_latency(10.0 + i as f64);
        if i == 0 {
            metadata = metadata.with_capability("cap_0");
        } else {
            metadata = metadata.with_requirement(format!("cap_{i}"));
        }
        // Benchmark setup: a duplicate id is impossible here
        let _ = registry.register(metadata, Arc::new(Stage)).await;
    }
    registry
}

/// Benchmark path search across chains of increasing length
fn bench_path_search(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("capability_path_search");
    group.measurement_time(Duration::from_secs(5));

    for len in [4usize, 16, 64] {
        let registry = rt.block_on(chain_registry(len));
        let output = format!("cap_{len}");

        group.bench_with_input(BenchmarkId::new("cached", len), &len, |b, _| {
            b.to_async(&rt)
                .iter(|| async { black_box(registry.find_optimal_path("cap_0", &output).await) })
        });

        group.bench_with_input(BenchmarkId::new("after_invalidation", len), &len, |b, _| {
            b.to_async(&rt).iter(|| async {
                let _ = registry.update_metrics("stage_0", 10.0, true).await;
                black_box(registry.find_optimal_path("cap_0", &output).await)
            })
        });
    }

    group.finish();
}

/// Benchmark working memory writes, including cleanup passes
fn bench_working_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("working_memory");
    group.throughput(Throughput::Elements(100));

    group.bench_function("store_100_step_results", |b| {
        b.iter_batched(
            || WorkingMemory::new(1024 * 1024, 0.8),
            |mut memory| {
                for i in 1..=100 {
                    let _ = memory.set(
                        WorkingMemory::step_key(i),
                        json!({"index": i, "payload": "x".repeat(64)}),
                    );
                }
                black_box(memory.total_bytes())
            },
            BatchSize::SmallInput,
        )
    });

    // A small limit forces repeated eviction
    group.bench_function("store_100_under_pressure", |b| {
        b.iter_batched(
            || WorkingMemory::new(4 * 1024, 0.5),
            |mut memory| {
                for i in 1..=100 {
                    let _ = memory.set(WorkingMemory::step_key(i), json!("y".repeat(128)));
                }
                black_box(memory.len())
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

/// Benchmark placeholder resolution over nested parameters
fn bench_placeholders(c: &mut Criterion) {
    let outputs = vec![
        json!({"sum": 5, "items": [{"id": 1}, {"id": 2}]}),
        json!("plain text result"),
        json!(r#"{"total": 12.5}"#),
    ];
    let params = json!({
        "x": "{{step_1_output.sum}}",
        "second": "{{step_1_output.items.1.id}}",
        "msg": "got {{step_2_output}} and {{step_3_output.total}}",
        "nested": {"list": ["{{step_1_output}}", "literal", 42]},
    });

    c.bench_function("resolve_placeholders", |b| {
        b.iter(|| {
            black_box(resolve_placeholders(black_box(&params), |n| {
                outputs.get(n.checked_sub(1)?).cloned()
            }))
        })
    });
}

/// Benchmark one complete session end to end
fn bench_execute(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let llm = ScriptedLlm::new()
        .when("Summarize", "Added the numbers.")
        .with_fallback(fixtures::tool_call("calculator", json!({"a": 2, "b": 3})));
    let runtime = RuntimeOrchestrator::builder()
        .llm(Arc::new(llm))
        .tools(Arc::new(MockToolRegistry::new().with_calculator()))
        .prompts(Arc::new(StaticPromptService::default()))
        .build()
        .unwrap();
    rt.block_on(runtime.initialize()).unwrap();
    let agent = fixtures::tool_agent(["calculator"]);

    c.bench_function("execute_single_shot", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(runtime.execute("Add 2 and 3", &agent).await) })
    });
}

criterion_group!(
    benches,
    bench_path_search,
    bench_working_memory,
    bench_placeholders,
    bench_execute
);
criterion_main!(benches);
