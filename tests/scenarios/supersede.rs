//! Test: Supersede - a newer run in the same concurrency group cancels the older one

use crate::helpers::*;
use ci_runner::core::{Event, InstanceStatus, RunStatus};
use ci_runner::execution::{ExecutionEvent, WorkflowEngine};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

/// Same key: the first run is cancelled and the second completes
#[tokio::test(start_paused = true)]
async fn test_second_run_cancels_first() {
    let workflow = bundled_workflow();
    let engine = WorkflowEngine::new(ScriptedRunner::new().delay("", "Build", MINUTE));
    let superseded = Arc::new(Mutex::new(Vec::new()));
    let seen = superseded.clone();
    engine.add_event_handler(move |event| {
        if let ExecutionEvent::RunSuperseded { run_id, .. } = event {
            seen.lock().unwrap().push(run_id);
        }
    });

    let first = engine.start(&workflow, Event::push("main", "abc")).unwrap();
    // let the first run reach its Build step
    tokio::time::sleep(Duration::from_secs(10)).await;
    let second = engine.start(&workflow, Event::push("main", "abc")).unwrap();

    assert_eq!(first.group.as_deref(), Some("Rust-abc"));
    assert_eq!(second.group, first.group);
    assert_eq!(second.superseded, Some(first.run_id));
    assert!(first.is_cancelled());

    let first_id = first.run_id;
    let first = first.wait().await.unwrap();
    let second = second.wait().await.unwrap();

    assert_eq!(first.status, RunStatus::Cancelled);
    for os in OS_VARIANTS {
        assert_instance_status(&first, os, InstanceStatus::Cancelled);
        assert_step_states(
            &first,
            os,
            &["succeeded", "succeeded", "cancelled", "skipped", "skipped"],
        );
        assert_instance_status(&second, os, InstanceStatus::Succeeded);
    }
    assert_eq!(second.status, RunStatus::Succeeded);
    assert_eq!(*superseded.lock().unwrap(), vec![first_id]);
    assert!(engine.registry().is_empty());
}

/// Different keys run side by side
#[tokio::test(start_paused = true)]
async fn test_different_groups_run_concurrently() {
    let workflow = bundled_workflow();
    let engine = WorkflowEngine::new(ScriptedRunner::new().delay("", "Build", MINUTE));

    let push = engine.start(&workflow, Event::push("main", "abc")).unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    let other_sha = engine.start(&workflow, Event::push("main", "def")).unwrap();
    let pr = engine
        .start(&workflow, Event::pull_request("main", 9, "abc"))
        .unwrap();

    assert_eq!(pr.group.as_deref(), Some("Rust-9"));
    assert!(other_sha.superseded.is_none());
    assert!(pr.superseded.is_none());

    for handle in [push, other_sha, pr] {
        let report = handle.wait().await.unwrap();
        assert_eq!(report.status, RunStatus::Succeeded);
    }
}

/// Updates to the same pull request share a group even with new revisions
#[tokio::test(start_paused = true)]
async fn test_pull_request_updates_supersede() {
    let workflow = bundled_workflow();
    let engine = WorkflowEngine::new(ScriptedRunner::new().delay("", "Download FFmpeg", MINUTE));

    let first = engine
        .start(&workflow, Event::pull_request("main", 9, "abc"))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    let second = engine
        .start(&workflow, Event::pull_request("main", 9, "def"))
        .unwrap();

    assert_eq!(second.superseded, Some(first.run_id));
    assert_eq!(first.wait().await.unwrap().status, RunStatus::Cancelled);
    assert_eq!(second.wait().await.unwrap().status, RunStatus::Succeeded);
}

/// Cancelling a handle directly stops only that run
#[tokio::test(start_paused = true)]
async fn test_manual_cancel() {
    let workflow = bundled_workflow();
    let engine = WorkflowEngine::new(ScriptedRunner::new().delay("", "Run tests", MINUTE));

    let handle = engine.start(&workflow, Event::push("main", "abc")).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.cancel();

    let report = handle.wait().await.unwrap();
    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.count_with_status(InstanceStatus::Cancelled), 4);
}
