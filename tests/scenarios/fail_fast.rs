//! Test: Fail Fast - a failing step ends its instance

use crate::helpers::*;
use ci_runner::core::{Event, InstanceStatus, StepState};
use ci_runner::execution::WorkflowEngine;

/// Steps after the failing one never run
#[tokio::test]
async fn test_failing_build_skips_check_and_tests() {
    let workflow = bundled_workflow();
    let engine = WorkflowEngine::new(ScriptedRunner::new().fail("ubuntu-latest", "Build"));

    let report = engine
        .dispatch(&workflow, Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        engine.runner().steps_run_by(report.run_id, "ubuntu-latest"),
        vec!["Run actions/checkout@v4", "Download FFmpeg", "Build"]
    );
    assert_instance_status(&report, "ubuntu-latest", InstanceStatus::Failed);
    assert_step_states(
        &report,
        "ubuntu-latest",
        &["succeeded", "succeeded", "failed", "skipped", "skipped"],
    );
}

/// Each failing position stops at exactly that step
#[tokio::test]
async fn test_failure_at_every_position() {
    let workflow = bundled_workflow();

    for (k, step) in BUNDLED_STEPS.iter().enumerate() {
        let engine = WorkflowEngine::new(ScriptedRunner::new().fail("macos-13", step));
        let report = engine
            .dispatch(&workflow, Event::push("main", "abc"))
            .await
            .unwrap()
            .unwrap();

        let ran = engine.runner().steps_run_by(report.run_id, "macos-13");
        assert_eq!(ran, BUNDLED_STEPS[..=k].to_vec(), "failure at step {}", k + 1);
        assert_instance_status(&report, "macos-13", InstanceStatus::Failed);
        assert!(!report.is_success());
    }
}

/// The exit code is kept on the failed step
#[tokio::test]
async fn test_exit_code_is_recorded() {
    let workflow = bundled_workflow();
    let engine = WorkflowEngine::new(ScriptedRunner::new().fail_with(
        "macos-14",
        "Download FFmpeg",
        101,
    ));

    let report = engine
        .dispatch(&workflow, Event::push("main", "abc"))
        .await
        .unwrap()
        .unwrap();

    let failed = &instance(&report, "macos-14").steps[1];
    match &failed.state {
        StepState::Failed { exit_code, error, .. } => {
            assert_eq!(*exit_code, Some(101));
            assert!(error.contains("101"));
        }
        other => panic!("expected a failed step, got {:?}", other),
    }
}
