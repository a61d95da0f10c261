//! Instance executor - runs one instance's steps in order, fail-fast

use crate::{
    core::{InstanceReport, InstanceStatus, RunInstance, StepState},
    execution::{EventBus, ExecutionEvent},
    host::{StepEnvironment, StepRunner},
};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Why a guarded future did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interruption {
    Cancelled,
    TimedOut,
}

/// Await `fut` unless the run is cancelled or the deadline passes first
///
/// Losing the race drops `fut`, which kills any child process it owns.
async fn guard<F: Future>(
    fut: F,
    cancel: &CancellationToken,
    deadline: Instant,
) -> Result<F::Output, Interruption> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interruption::Cancelled),
        _ = tokio::time::sleep_until(deadline) => Err(Interruption::TimedOut),
        output = fut => Ok(output),
    }
}

/// Executes a single run instance
pub struct InstanceExecutor<R> {
    runner: Arc<R>,
    events: EventBus,
}

impl<R: StepRunner> InstanceExecutor<R> {
    pub fn new(runner: Arc<R>, events: EventBus) -> Self {
        Self { runner, events }
    }

    /// Run every step of `instance` and report the outcome
    ///
    /// The first failing step ends the instance and the remaining steps are
    /// recorded as skipped. The whole sequence shares one deadline of
    /// `instance.timeout`, measured from the call.
    pub async fn execute(
        &self,
        run_id: Uuid,
        instance: &RunInstance,
        cancel: &CancellationToken,
    ) -> InstanceReport {
        let mut report = InstanceReport::pending(instance);

        if cancel.is_cancelled() {
            info!("{} cancelled before it started", instance.label);
            report.status = InstanceStatus::Cancelled;
            report.skip_remaining("run was cancelled");
            report.completed_at = Some(Utc::now());
            self.emit_finished(run_id, &report);
            return report;
        }

        info!("Starting {} on {}", instance.label, instance.runs_on);
        let deadline = Instant::now() + instance.timeout;
        report.status = InstanceStatus::Running;
        report.started_at = Some(Utc::now());
        self.events.emit(ExecutionEvent::InstanceStarted {
            run_id,
            instance: instance.label.clone(),
        });

        let workspace = match guard(self.runner.prepare(run_id, instance), cancel, deadline).await {
            Ok(Ok(workspace)) => workspace,
            Ok(Err(e)) => {
                error!("Failed to prepare {}: {}", instance.label, e);
                report.status = InstanceStatus::Failed;
                report.error = Some(e.to_string());
                report.skip_remaining("workspace could not be prepared");
                report.completed_at = Some(Utc::now());
                self.emit_finished(run_id, &report);
                return report;
            }
            Err(interruption) => {
                report.status = Self::status_for(interruption);
                report.skip_remaining(Self::skip_reason(report.status));
                report.completed_at = Some(Utc::now());
                self.emit_finished(run_id, &report);
                return report;
            }
        };

        let total = instance.steps.len();
        let mut status = InstanceStatus::Succeeded;

        for step in &instance.steps {
            let mut env = instance.env.clone();
            env.insert("GITHUB_WORKSPACE".to_string(), workspace.display().to_string());
            env.extend(step.env.clone());
            let step_env = StepEnvironment {
                run_id,
                instance: instance.label.clone(),
                workspace: workspace.clone(),
                env,
            };

            let started_at = Utc::now();
            report.steps[step.index].state = StepState::Running { started_at };
            self.events.emit(ExecutionEvent::StepStarted {
                run_id,
                instance: instance.label.clone(),
                step: step.name.clone(),
                index: step.index,
                total,
            });

            let state = match guard(self.runner.run_step(step, &step_env), cancel, deadline).await {
                Ok(Ok(output)) if output.success() => StepState::Succeeded {
                    output: output.combined(),
                    started_at,
                    completed_at: Utc::now(),
                },
                Ok(Ok(output)) => {
                    warn!(
                        "{}: step '{}' exited with code {}",
                        instance.label, step.name, output.exit_code
                    );
                    status = InstanceStatus::Failed;
                    StepState::Failed {
                        error: format!("Process completed with exit code {}", output.exit_code),
                        exit_code: Some(output.exit_code),
                        output: output.combined(),
                        started_at,
                        failed_at: Utc::now(),
                    }
                }
                Ok(Err(e)) => {
                    error!("{}: step '{}' could not run: {}", instance.label, step.name, e);
                    status = InstanceStatus::Failed;
                    StepState::Failed {
                        error: e.to_string(),
                        exit_code: None,
                        output: String::new(),
                        started_at,
                        failed_at: Utc::now(),
                    }
                }
                Err(Interruption::Cancelled) => {
                    info!("{}: step '{}' cancelled", instance.label, step.name);
                    status = InstanceStatus::Cancelled;
                    StepState::Cancelled {
                        started_at,
                        stopped_at: Utc::now(),
                    }
                }
                Err(Interruption::TimedOut) => {
                    error!(
                        "{} exceeded its {}s timeout during step '{}'",
                        instance.label,
                        instance.timeout.as_secs(),
                        step.name
                    );
                    status = InstanceStatus::TimedOut;
                    StepState::TimedOut {
                        started_at,
                        stopped_at: Utc::now(),
                    }
                }
            };

            if let StepState::Succeeded { output, .. } | StepState::Failed { output, .. } = &state {
                if !output.is_empty() {
                    self.events.emit(ExecutionEvent::StepOutput {
                        run_id,
                        instance: instance.label.clone(),
                        step: step.name.clone(),
                        output: output.clone(),
                    });
                }
            }
            self.events.emit(ExecutionEvent::StepFinished {
                run_id,
                instance: instance.label.clone(),
                step: step.name.clone(),
                state: state.clone(),
            });
            report.steps[step.index].state = state;

            if status != InstanceStatus::Succeeded {
                break;
            }
        }

        report.status = status;
        report.skip_remaining(Self::skip_reason(status));

        if let Err(e) = self.runner.finish(&workspace).await {
            warn!("Failed to clean up workspace of {}: {}", instance.label, e);
        }

        report.completed_at = Some(Utc::now());
        info!("{} finished: {:?}", instance.label, report.status);
        self.emit_finished(run_id, &report);
        report
    }

    fn status_for(interruption: Interruption) -> InstanceStatus {
        match interruption {
            Interruption::Cancelled => InstanceStatus::Cancelled,
            Interruption::TimedOut => InstanceStatus::TimedOut,
        }
    }

    fn skip_reason(status: InstanceStatus) -> &'static str {
        match status {
            InstanceStatus::Cancelled => "run was cancelled",
            InstanceStatus::TimedOut => "instance timed out",
            _ => "an earlier step failed",
        }
    }

    fn emit_finished(&self, run_id: Uuid, report: &InstanceReport) {
        self.events.emit(ExecutionEvent::InstanceFinished {
            run_id,
            instance: report.label.clone(),
            status: report.status,
        });
    }
}
