//! Test: Aggregation - a run succeeds only when every instance does

use crate::helpers::*;
use ci_runner::core::{Event, RunStatus};
use ci_runner::execution::WorkflowEngine;
use ci_runner::persistence::{InMemoryPersistence, PersistenceBackend, RunSummary};
use std::time::Duration;

#[tokio::test]
async fn test_all_instances_pass() {
    let engine = WorkflowEngine::new(ScriptedRunner::new());
    let report = engine
        .dispatch(&bundled_workflow(), Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(report.succeeded_instances(), 4);
    assert_eq!(engine.runner().calls().len(), 20);
}

#[tokio::test]
async fn test_single_failure_fails_run() {
    let engine = WorkflowEngine::new(ScriptedRunner::new().fail("macos-14", "Run tests"));
    let report = engine
        .dispatch(&bundled_workflow(), Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.succeeded_instances(), 3);
}

/// Failures outrank timeouts and both count as failed in history
#[tokio::test(start_paused = true)]
async fn test_mixed_outcomes_are_summarized() {
    let engine = WorkflowEngine::new(
        ScriptedRunner::new()
            .fail("ubuntu-latest", "Build")
            .delay("windows-latest", "Build", Duration::from_secs(3600)),
    );
    let report = engine
        .dispatch(&bundled_workflow(), Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);

    let store = InMemoryPersistence::new();
    let summary = RunSummary::from_report(&report);
    store.save_run(&summary).await.unwrap();

    let saved = store.load_run(report.run_id).await.unwrap().unwrap();
    assert_eq!(saved.status, RunStatus::Failed);
    assert_eq!(saved.total_instances, 4);
    assert_eq!(saved.succeeded_instances, 2);
    assert_eq!(saved.failed_instances, 2);
    assert_eq!(saved.group.as_deref(), Some("Rust-abc"));
    assert_eq!(store.list_workflows().await.unwrap(), vec!["Rust"]);
}

/// Instance reports keep expansion order regardless of finishing order
#[tokio::test(start_paused = true)]
async fn test_reports_are_in_expansion_order() {
    let engine = WorkflowEngine::new(
        ScriptedRunner::new().delay("ubuntu-latest", "Build", Duration::from_secs(60)),
    );
    let report = engine
        .dispatch(&bundled_workflow(), Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    let runs_on: Vec<&str> = report.instances.iter().map(|i| i.runs_on.as_str()).collect();
    assert_eq!(runs_on, OS_VARIANTS);
}
