//! Test: Trigger Gating - only push and pull_request on main start a run

use crate::helpers::*;
use ci_runner::core::{Event, EventKind};
use ci_runner::execution::WorkflowEngine;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn event(kind: EventKind, branch: &str) -> Event {
    Event {
        kind,
        branch: branch.to_string(),
        sha: Some("abc".to_string()),
        pull_request: None,
        repository: None,
    }
}

/// Non-matching events create no instances and emit nothing
#[tokio::test]
async fn test_non_matching_events_do_not_run() {
    let workflow = bundled_workflow();
    let engine = WorkflowEngine::new(ScriptedRunner::new());
    let emitted = Arc::new(AtomicUsize::new(0));
    let counter = emitted.clone();
    engine.add_event_handler(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let events = vec![
        event(EventKind::Push, "develop"),
        event(EventKind::Push, "feature/main"),
        event(EventKind::PullRequest, "release"),
        event(EventKind::Other("release".to_string()), "main"),
        event(EventKind::Other("workflow_dispatch".to_string()), "main"),
    ];

    for e in events {
        assert!(engine.plan(&workflow, &e).is_none(), "{:?} should not trigger", e);
        let report = engine.dispatch(&workflow, e).await.unwrap();
        assert!(report.is_none());
    }

    assert!(engine.runner().calls().is_empty());
    assert_eq!(emitted.load(Ordering::SeqCst), 0);
    assert!(engine.registry().is_empty());
}

/// Push and pull request events on main both run all four variants
#[tokio::test]
async fn test_matching_events_run_every_variant() {
    let workflow = bundled_workflow();
    let engine = WorkflowEngine::new(ScriptedRunner::new());

    for e in [Event::push("main", "abc"), Event::pull_request("main", 9, "def")] {
        let report = engine.dispatch(&workflow, e).await.unwrap().unwrap();
        let runs_on: Vec<&str> = report.instances.iter().map(|i| i.runs_on.as_str()).collect();
        assert_eq!(runs_on, OS_VARIANTS);
        assert!(report.is_success());
    }
}

/// Branch globs in a custom workflow
#[tokio::test]
async fn test_branch_globs() {
    let workflow = workflow_from_yaml(
        r#"
name: Release
on:
  push:
    branches: ["release/**", "v*"]
jobs:
  publish:
    runs-on: ubuntu-latest
    steps:
      - run: echo publish
"#,
    );
    let engine = WorkflowEngine::new(ScriptedRunner::new());

    assert!(engine.plan(&workflow, &Event::push("release/1.x/rc", "a")).is_some());
    assert!(engine.plan(&workflow, &Event::push("v2", "a")).is_some());
    assert!(engine.plan(&workflow, &Event::push("v2/hotfix", "a")).is_none());
    assert!(engine.plan(&workflow, &Event::push("main", "a")).is_none());
    assert!(engine
        .plan(&workflow, &Event::pull_request("release/1.x", 3, "a"))
        .is_none());
}
