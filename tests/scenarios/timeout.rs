//! Test: Timeout - the job limit covers the whole step sequence

use crate::helpers::*;
use ci_runner::core::{Event, InstanceStatus, RunStatus};
use ci_runner::execution::WorkflowEngine;
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

/// A step that would succeed is stopped once the limit is reached
#[tokio::test(start_paused = true)]
async fn test_slow_step_times_out() {
    let workflow = bundled_workflow();
    let engine = WorkflowEngine::new(ScriptedRunner::new().delay("windows-latest", "Build", 30 * MINUTE));

    let report = engine
        .dispatch(&workflow, Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    assert_instance_status(&report, "windows-latest", InstanceStatus::TimedOut);
    assert_step_states(
        &report,
        "windows-latest",
        &["succeeded", "succeeded", "timed_out", "skipped", "skipped"],
    );
    assert_instance_status(&report, "ubuntu-latest", InstanceStatus::Succeeded);
    assert_eq!(report.status, RunStatus::Failed);
}

/// Steps that each fit the limit still time out together
#[tokio::test(start_paused = true)]
async fn test_timeout_is_cumulative() {
    let workflow = bundled_workflow();
    let mut runner = ScriptedRunner::new();
    for step in BUNDLED_STEPS {
        runner = runner.delay("macos-13", step, 2 * MINUTE);
    }
    let engine = WorkflowEngine::new(runner);

    let report = engine
        .dispatch(&workflow, Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    // 2 + 2 minutes pass, the third step is cut at the 5 minute mark
    assert_step_states(
        &report,
        "macos-13",
        &["succeeded", "succeeded", "timed_out", "skipped", "skipped"],
    );
    assert_instance_status(&report, "macos-13", InstanceStatus::TimedOut);
}

/// A run-wide override replaces the job's limit
#[tokio::test(start_paused = true)]
async fn test_timeout_override() {
    let workflow = bundled_workflow();
    let engine = WorkflowEngine::new(ScriptedRunner::new().delay("", "Run tests", 2 * MINUTE))
        .with_timeout_override(MINUTE);

    let report = engine
        .dispatch(&workflow, Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    for os in OS_VARIANTS {
        assert_instance_status(&report, os, InstanceStatus::TimedOut);
    }
    assert_eq!(report.status, RunStatus::Failed);
}
