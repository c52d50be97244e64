//! Benchmarks for template rendering and sequential pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use crewflow::events::NoOpEventSink;
use crewflow::pipeline::{PipelineRunner, RetryConfig};
use crewflow::reasoning::{ReasoningRequest, CONTEXT_HEADING};
use crewflow::stages::{render_template, StageBudget, StageResult};
use crewflow::testing::{crew_pipeline, named_pipeline, ScriptedReasoningService};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

fn template_benchmark(c: &mut Criterion) {
    let inputs = HashMap::from([
        ("topic".to_string(), "quantum computing".to_string()),
        ("audience".to_string(), "engineers".to_string()),
    ]);
    let template = "Conduct a thorough research about {topic} for {audience}. \
                    Make sure you find any interesting and relevant information about {topic}.";

    c.bench_function("render_template", |b| {
        b.iter(|| render_template(black_box(template), black_box(&inputs)));
    });

    let pipeline = crew_pipeline(StageBudget::default());
    c.bench_function("render_crew", |b| {
        b.iter(|| pipeline.render(black_box(&inputs)));
    });

    let stages = pipeline.render(&inputs).unwrap_or_default();
    let previous: Vec<StageResult> = (0..8)
        .map(|i| StageResult::completed(format!("stage{i}"), "x".repeat(2_000), 0, Utc::now()))
        .collect();
    c.bench_function("context_handoff_8_stages", |b| {
        b.iter(|| {
            let request = ReasoningRequest::for_stage(&stages[1], black_box(&previous));
            black_box(request.instruction.contains(CONTEXT_HEADING))
        });
    });
}

fn pipeline_benchmark(c: &mut Criterion) {
    let Ok(rt) = tokio::runtime::Builder::new_current_thread().enable_all().build() else {
        return;
    };
    let names: Vec<String> = (0..10).map(|i| format!("stage{i}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let pipeline = named_pipeline(&name_refs, StageBudget::unbounded());

    c.bench_function("run_10_scripted_stages", |b| {
        b.iter_batched(
            || {
                let service = names
                    .iter()
                    .fold(ScriptedReasoningService::new(), |s, n| s.reply(n, "done"));
                PipelineRunner::new(Arc::new(service))
                    .with_retry(RetryConfig::immediate())
                    .with_event_sink(Arc::new(NoOpEventSink))
            },
            |runner| rt.block_on(runner.run(&pipeline, "bench")),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, template_benchmark, pipeline_benchmark);
criterion_main!(benches);
