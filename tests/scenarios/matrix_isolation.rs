//! Test: Matrix Isolation - one instance per OS variant, failures stay local

use crate::helpers::*;
use ci_runner::core::{Event, InstanceStatus, RunStatus};
use ci_runner::execution::WorkflowEngine;
use std::collections::HashSet;

/// A failure in one variant leaves the other variants untouched
#[tokio::test]
async fn test_failure_in_one_variant_is_isolated() {
    let workflow = bundled_workflow();
    let engine = WorkflowEngine::new(ScriptedRunner::new().fail("windows-latest", "Build"));

    let report = engine
        .dispatch(&workflow, Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_instance_status(&report, "windows-latest", InstanceStatus::Failed);
    for os in ["ubuntu-latest", "macos-13", "macos-14"] {
        assert_instance_status(&report, os, InstanceStatus::Succeeded);
        assert_eq!(
            engine.runner().steps_run_by(report.run_id, os),
            BUNDLED_STEPS.to_vec()
        );
    }
}

/// Every instance gets its own workspace and its own environment
#[tokio::test]
async fn test_instances_have_separate_workspaces() {
    let workflow = bundled_workflow();
    let engine = WorkflowEngine::new(ScriptedRunner::new());

    let report = engine
        .dispatch(&workflow, Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    let calls = engine.runner().calls();
    let workspaces: HashSet<_> = calls.iter().map(|c| c.workspace.clone()).collect();
    assert_eq!(workspaces.len(), 4);
    assert_eq!(report.instances.len(), 4);

    for call in &calls {
        assert_eq!(call.env.get("CARGO_TERM_COLOR").map(String::as_str), Some("always"));
        assert_eq!(call.env.get("CI").map(String::as_str), Some("true"));
        assert_eq!(call.env.get("GITHUB_SHA").map(String::as_str), Some("abc"));
        assert_eq!(
            call.env.get("GITHUB_WORKSPACE").map(String::as_str),
            Some(call.workspace.display().to_string().as_str())
        );
    }

    let windows = calls
        .iter()
        .find(|c| c.instance.contains("windows-latest"))
        .unwrap();
    assert_eq!(windows.env.get("RUNNER_OS").map(String::as_str), Some("Windows"));
    let mac = calls.iter().find(|c| c.instance.contains("macos-14")).unwrap();
    assert_eq!(mac.env.get("RUNNER_OS").map(String::as_str), Some("macOS"));
}

/// Include and exclude reshape the instance set
#[tokio::test]
async fn test_include_and_exclude() {
    let workflow = workflow_from_yaml(
        r#"
name: Matrix
on:
  push:
jobs:
  test:
    runs-on: ${{ matrix.os }}
    strategy:
      matrix:
        os: [ubuntu-latest, windows-latest]
        toolchain: [stable, nightly]
        exclude:
          - os: windows-latest
            toolchain: nightly
        include:
          - os: macos-14
            toolchain: stable
    steps:
      - name: Test on ${{ matrix.toolchain }}
        run: cargo +${{ matrix.toolchain }} test
"#,
    );
    let engine = WorkflowEngine::new(ScriptedRunner::new());
    let report = engine
        .dispatch(&workflow, Event::push("anything", "abc"))
        .await
        .unwrap()
        .unwrap();

    let labels: Vec<&str> = report.instances.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "test (ubuntu-latest, stable)",
            "test (ubuntu-latest, nightly)",
            "test (windows-latest, stable)",
            "test (macos-14, stable)",
        ]
    );
    let names: HashSet<String> = engine.runner().calls().into_iter().map(|c| c.step).collect();
    assert!(names.contains("Test on nightly"));
}
