//! Test: Max Parallel - a job's instances wait for a free slot

use crate::helpers::*;
use ci_runner::core::{Event, InstanceStatus, RunStatus};
use ci_runner::execution::WorkflowEngine;
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

fn limited_workflow(max_parallel: usize) -> ci_runner::core::Workflow {
    workflow_from_yaml(&format!(
        r#"
name: Limited
on:
  push:
    branches: [main]
jobs:
  build:
    runs-on: ${{{{ matrix.os }}}}
    timeout-minutes: 5
    strategy:
      max-parallel: {}
      matrix:
        os: [ubuntu-latest, windows-latest, macos-14]
    steps:
      - name: Build
        run: cargo build
"#,
        max_parallel
    ))
}

/// Start times of every step, earliest first
fn build_starts(engine: &WorkflowEngine<ScriptedRunner>) -> Vec<tokio::time::Instant> {
    let mut calls = engine.runner().calls();
    calls.sort_by_key(|c| c.started_at);
    calls.iter().map(|c| c.started_at).collect()
}

/// With one slot, instances run back to back
#[tokio::test(start_paused = true)]
async fn test_instances_run_one_at_a_time() {
    let engine = WorkflowEngine::new(ScriptedRunner::new().delay("", "Build", 3 * MINUTE));

    let report = engine
        .dispatch(&limited_workflow(1), Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    let starts = build_starts(&engine);
    assert_eq!(starts.len(), 3);
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= 3 * MINUTE, "instances overlapped");
    }

    // the last instance starts 6 minutes in; its 5 minute limit starts with its slot
    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(report.count_with_status(InstanceStatus::Succeeded), 3);
}

/// Two slots: the third instance waits for the first free one
#[tokio::test(start_paused = true)]
async fn test_instances_share_limited_slots() {
    let engine = WorkflowEngine::new(ScriptedRunner::new().delay("", "Build", 3 * MINUTE));

    let report = engine
        .dispatch(&limited_workflow(2), Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    let starts = build_starts(&engine);
    assert_eq!(starts[1], starts[0]);
    assert!(starts[2] - starts[0] >= 3 * MINUTE);
    assert_eq!(report.status, RunStatus::Succeeded);
}

/// Without a limit every instance starts at once
#[tokio::test(start_paused = true)]
async fn test_unlimited_instances_start_together() {
    let engine = WorkflowEngine::new(ScriptedRunner::new().delay("", "Build", 3 * MINUTE));

    engine
        .dispatch(&bundled_workflow(), Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    let calls = engine.runner().calls();
    let checkout_starts: Vec<_> = calls
        .iter()
        .filter(|c| c.step == BUNDLED_STEPS[0])
        .map(|c| c.started_at)
        .collect();
    assert_eq!(checkout_starts.len(), 4);
    assert!(checkout_starts.iter().all(|t| *t == checkout_starts[0]));
}
