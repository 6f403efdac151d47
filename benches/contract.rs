//! Benchmarks for completion cleaning and contract validation
//!
//! Every model response passes through these paths, so they should stay
//! negligible next to network latency.

use criterion::{Criterion, criterion_group, criterion_main};
use pmagent::contract::clean_completion;
use pmagent::contract::extraction::ExtractionResult;
use pmagent::contract::insights::ProjectInsights;
use pmagent::contract::prompts::tasks_block;
use pmagent::project::TaskInput;
use std::hint::black_box;

const INSIGHTS: &str = r#"Sure, here is the analysis you asked for:
```json
{"summary":"Three tasks remain; deploy is blocked on review.","riskLevel":"Medium",
 "deadlines":{"overdue":[{"id":"4","title":"Code review"}],
              "dueSoon":[{"id":"5","title":"Deploy"}],
              "onTrack":[{"id":"6","title":"Docs"}]},
 "standupUpdate":"Yesterday: finished build. Today: review. Blockers: reviewer out.",
 "suggestedActions":[{"taskId":"4","action":"Reassign review","reason":"Overdue"},
                     {"taskId":null,"action":"Move deploy date","reason":"Dependency slip"}]}
```
Let me know if you need anything else."#;

fn extraction_payload(count: usize) -> String {
    let tasks: Vec<String> = (1..=count)
        .map(|i| {
            format!(
                r#"{{"id":"{i}","title":"Task {i}","description":"Do part {i}","dependencies":["{}"]}}"#,
                i.saturating_sub(1)
            )
        })
        .collect();
    format!("```json\n{{\"tasks\": [{}]}}\n```", tasks.join(","))
}

fn tasks(count: usize) -> Vec<TaskInput> {
    (1..=count)
        .map(|i| TaskInput {
            id: i.to_string(),
            title: format!("Task {i}"),
            status: if i % 3 == 0 { "In Progress" } else { "todo" }.to_string(),
            due_date: Some("2026-10-20".to_string()),
            assignee: (i % 2 == 0).then(|| "sam".to_string()),
            dependencies: vec![(i.saturating_sub(1)).to_string()],
        })
        .collect()
}

fn bench_cleaning(c: &mut Criterion) {
    c.bench_function("clean_completion/insights", |b| {
        b.iter(|| clean_completion(black_box(INSIGHTS)))
    });
}

fn bench_validation(c: &mut Criterion) {
    c.bench_function("insights/from_completion", |b| {
        b.iter(|| ProjectInsights::from_completion(black_box(INSIGHTS)))
    });

    let payload = extraction_payload(50);
    c.bench_function("extraction/from_completion_50", |b| {
        b.iter(|| ExtractionResult::from_completion(black_box(&payload)))
    });
}

fn bench_prompt_rendering(c: &mut Criterion) {
    let tasks = tasks(200);
    c.bench_function("tasks_block/200", |b| b.iter(|| tasks_block(black_box(&tasks))));
}

criterion_group!(benches, bench_cleaning, bench_validation, bench_prompt_rendering);
criterion_main!(benches);
