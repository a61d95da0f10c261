//! Test utility functions for ci-runner
#![allow(dead_code)]

use async_trait::async_trait;
use ci_runner::core::config::WorkflowConfig;
use ci_runner::core::{
    InstanceReport, InstanceStatus, ResolvedStep, RunInstance, StepState, Workflow,
};
use ci_runner::execution::RunReport;
use ci_runner::host::{RunnerError, StepEnvironment, StepOutput, StepRunner};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// One step invocation seen by the mock runner
#[derive(Debug, Clone)]
pub struct StepCall {
    pub run_id: Uuid,
    pub instance: String,
    pub step: String,
    pub workspace: PathBuf,
    pub env: HashMap<String, String>,
    pub started_at: tokio::time::Instant,
}

/// Scripted step runner: every step succeeds unless told otherwise
///
/// Instances are selected by a substring of their label, so `"windows"`
/// picks `build (windows-latest)` and `""` picks every instance.
#[derive(Default)]
pub struct ScriptedRunner {
    failures: Vec<(String, String, i32)>,
    delays: Vec<(String, String, Duration)>,
    calls: Mutex<Vec<StepCall>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `step` of matching instances exit with code 1
    pub fn fail(self, instance: &str, step: &str) -> Self {
        self.fail_with(instance, step, 1)
    }

    pub fn fail_with(mut self, instance: &str, step: &str, exit_code: i32) -> Self {
        self.failures
            .push((instance.to_string(), step.to_string(), exit_code));
        self
    }

    /// Make `step` of matching instances take `duration` before succeeding
    pub fn delay(mut self, instance: &str, step: &str, duration: Duration) -> Self {
        self.delays
            .push((instance.to_string(), step.to_string(), duration));
        self
    }

    pub fn calls(&self) -> Vec<StepCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Step names run by instances whose label contains `instance`, in order
    pub fn steps_run_by(&self, run_id: Uuid, instance: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.run_id == run_id && c.instance.contains(instance))
            .map(|c| c.step)
            .collect()
    }

    fn selects(instance_pattern: &str, step_pattern: &str, env: &StepEnvironment, step: &ResolvedStep) -> bool {
        env.instance.contains(instance_pattern) && step.name == step_pattern
    }
}

#[async_trait]
impl StepRunner for ScriptedRunner {
    async fn prepare(&self, run_id: Uuid, instance: &RunInstance) -> Result<PathBuf, RunnerError> {
        Ok(PathBuf::from("/work")
            .join(run_id.to_string())
            .join(instance.slug())
            .join("repo"))
    }

    async fn run_step(
        &self,
        step: &ResolvedStep,
        env: &StepEnvironment,
    ) -> Result<StepOutput, RunnerError> {
        self.calls.lock().unwrap().push(StepCall {
            run_id: env.run_id,
            instance: env.instance.clone(),
            step: step.name.clone(),
            workspace: env.workspace.clone(),
            env: env.env.clone(),
            started_at: tokio::time::Instant::now(),
        });

        let delay = self
            .delays
            .iter()
            .find(|(i, s, _)| Self::selects(i, s, env, step))
            .map(|(_, _, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .iter()
            .find(|(i, s, _)| Self::selects(i, s, env, step));
        match failure {
            Some((_, _, code)) => Ok(StepOutput::new("").with_exit_code(*code)),
            None => Ok(StepOutput::new(format!("{} ok", step.name))),
        }
    }
}

/// Step names of the bundled workflow, in order
pub const BUNDLED_STEPS: [&str; 5] = [
    "Run actions/checkout@v4",
    "Download FFmpeg",
    "Build",
    "Check without default features",
    "Run tests",
];

pub const OS_VARIANTS: [&str; 4] = ["ubuntu-latest", "windows-latest", "macos-13", "macos-14"];

pub fn bundled_workflow() -> Workflow {
    WorkflowConfig::bundled()
        .and_then(|c| c.to_workflow())
        .unwrap_or_else(|e| panic!("Bundled workflow failed to load: {}", e))
}

/// Parse a workflow from YAML string
pub fn workflow_from_yaml(yaml: &str) -> Workflow {
    WorkflowConfig::from_yaml(yaml)
        .and_then(|c| c.to_workflow())
        .unwrap_or_else(|e| panic!("Failed to parse workflow YAML: {}", e))
}

/// Find an instance report by its runner label
pub fn instance<'a>(report: &'a RunReport, runs_on: &str) -> &'a InstanceReport {
    report
        .instances
        .iter()
        .find(|i| i.runs_on == runs_on)
        .unwrap_or_else(|| panic!("No instance runs on '{}'", runs_on))
}

/// Assert an instance finished with the given status
pub fn assert_instance_status(report: &RunReport, runs_on: &str, expected: InstanceStatus) {
    let instance = instance(report, runs_on);
    assert_eq!(
        instance.status, expected,
        "Instance '{}' should be {:?}, but was {:?}: {:?}",
        instance.label, expected, instance.status, instance.steps
    );
}

/// Assert the state of every step of an instance matches `expected`
pub fn assert_step_states(report: &RunReport, runs_on: &str, expected: &[&str]) {
    let instance = instance(report, runs_on);
    let actual: Vec<&str> = instance
        .steps
        .iter()
        .map(|s| match s.state {
            StepState::Pending => "pending",
            StepState::Running { .. } => "running",
            StepState::Succeeded { .. } => "succeeded",
            StepState::Failed { .. } => "failed",
            StepState::TimedOut { .. } => "timed_out",
            StepState::Cancelled { .. } => "cancelled",
            StepState::Skipped { .. } => "skipped",
        })
        .collect();
    assert_eq!(
        actual, expected,
        "Step states of '{}' differ",
        instance.label
    );
}
