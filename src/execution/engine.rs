//! Main execution engine - turns triggering events into concurrent runs

use crate::{
    core::{Event, InstanceStatus, RunStatus, StepState, Workflow},
    execution::{ConcurrencyRegistry, InstanceExecutor, RunPlan, RunReport},
    host::{RunnerError, StepRunner},
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        workflow: String,
        group: Option<String>,
        instances: usize,
    },
    RunSuperseded {
        run_id: Uuid,
        superseded_by: Uuid,
        group: String,
    },
    InstanceStarted {
        run_id: Uuid,
        instance: String,
    },
    StepStarted {
        run_id: Uuid,
        instance: String,
        step: String,
        index: usize,
        total: usize,
    },
    StepOutput {
        run_id: Uuid,
        instance: String,
        step: String,
        output: String,
    },
    StepFinished {
        run_id: Uuid,
        instance: String,
        step: String,
        state: StepState,
    },
    InstanceFinished {
        run_id: Uuid,
        instance: String,
        status: InstanceStatus,
    },
    RunCompleted {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fan-out of execution events to every registered handler
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: EventHandler) {
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(handler);
    }

    /// Emit an event to all handlers
    pub fn emit(&self, event: ExecutionEvent) {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }
}

/// A run in flight
pub struct RunHandle {
    pub run_id: Uuid,
    pub group: Option<String>,
    /// Run cancelled when this one started
    pub superseded: Option<Uuid>,
    token: CancellationToken,
    handle: JoinHandle<Result<RunReport, RunnerError>>,
}

impl RunHandle {
    /// Cancel every instance of this run
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token that cancels this run when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for every instance to reach a terminal status
    pub async fn wait(self) -> Result<RunReport, RunnerError> {
        self.handle
            .await
            .map_err(|e| RunnerError::Join(e.to_string()))?
    }
}

/// Workflow execution engine
pub struct WorkflowEngine<R> {
    runner: Arc<R>,
    registry: Arc<ConcurrencyRegistry>,
    events: EventBus,
    shutdown: CancellationToken,
    timeout_override: Option<Duration>,
}

impl<R: StepRunner + 'static> WorkflowEngine<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner: Arc::new(runner),
            registry: Arc::new(ConcurrencyRegistry::new()),
            events: EventBus::new(),
            shutdown: CancellationToken::new(),
            timeout_override: None,
        }
    }

    /// Replace every job's timeout with `timeout`
    pub fn with_timeout_override(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(Arc::new(handler));
    }

    pub fn registry(&self) -> &ConcurrencyRegistry {
        &self.registry
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Compute the run an event would start, or `None` if it does not trigger
    pub fn plan(&self, workflow: &Workflow, event: &Event) -> Option<RunPlan> {
        if !workflow.triggers.matches(event) {
            debug!(
                "{} on '{}' does not trigger {}",
                event.kind, event.branch, workflow.name
            );
            return None;
        }

        let run_id = Uuid::new_v4();
        let mut instances = workflow.expand(event, run_id);
        if let Some(timeout) = self.timeout_override {
            for instance in &mut instances {
                instance.timeout = timeout;
            }
        }

        Some(RunPlan {
            run_id,
            workflow: workflow.name.clone(),
            event: event.clone(),
            group: workflow.group_key(event, run_id),
            instances,
        })
    }

    /// Start a run for `event` without waiting for it
    ///
    /// Returns `None`, with no side effects, when the event does not match
    /// the workflow's triggers. Starting a run in an occupied concurrency
    /// group with cancel-in-progress set cancels the earlier run.
    pub fn start(&self, workflow: &Workflow, event: Event) -> Option<RunHandle> {
        let plan = self.plan(workflow, &event)?;
        Some(self.start_plan(workflow, plan))
    }

    /// Start a previously computed plan
    pub fn start_plan(&self, workflow: &Workflow, plan: RunPlan) -> RunHandle {
        let run_id = plan.run_id;
        let token = self.shutdown.child_token();

        let superseded = match (&plan.group, &workflow.concurrency) {
            (Some(group), Some(policy)) => {
                self.registry
                    .acquire(group, run_id, policy.cancel_in_progress, token.clone())
            }
            _ => None,
        };
        if let (Some(previous), Some(group)) = (superseded, &plan.group) {
            self.events.emit(ExecutionEvent::RunSuperseded {
                run_id: previous,
                superseded_by: run_id,
                group: group.clone(),
            });
        }

        info!(
            "Starting run {} of {} with {} instance(s)",
            run_id,
            plan.workflow,
            plan.instances.len()
        );
        self.events.emit(ExecutionEvent::RunStarted {
            run_id,
            workflow: plan.workflow.clone(),
            group: plan.group.clone(),
            instances: plan.instances.len(),
        });

        let limits: HashMap<String, Arc<Semaphore>> = workflow
            .jobs
            .iter()
            .filter_map(|job| {
                job.max_parallel
                    .map(|n| (job.id.clone(), Arc::new(Semaphore::new(n.max(1)))))
            })
            .collect();

        let started_at = Utc::now();
        let mut set = JoinSet::new();
        for instance in plan.instances {
            let executor = InstanceExecutor::new(self.runner.clone(), self.events.clone());
            let token = token.clone();
            let limit = limits.get(&instance.job_id).cloned();

            set.spawn(async move {
                let _permit = match limit {
                    Some(semaphore) => tokio::select! {
                        permit = semaphore.acquire_owned() => permit.ok(),
                        _ = token.cancelled() => None,
                    },
                    None => None,
                };
                executor.execute(run_id, &instance, &token).await
            });
        }

        let registry = self.registry.clone();
        let events = self.events.clone();
        let group = plan.group.clone();
        let workflow_name = plan.workflow;
        let event = plan.event;

        let handle = tokio::spawn(async move {
            let mut reports = Vec::new();
            let mut join_error = None;
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(report) => reports.push(report),
                    Err(e) => {
                        error!("Instance task of run {} failed: {}", run_id, e);
                        join_error = Some(RunnerError::Join(e.to_string()));
                    }
                }
            }

            if let Some(group) = &group {
                registry.release(group, run_id);
            }
            if let Some(e) = join_error {
                return Err(e);
            }

            reports.sort_by_key(|r| r.index);
            let status = RunStatus::aggregate(reports.iter().map(|r| r.status));
            info!("Run {} of {} finished: {:?}", run_id, workflow_name, status);
            events.emit(ExecutionEvent::RunCompleted { run_id, status });

            Ok(RunReport {
                run_id,
                workflow: workflow_name,
                event,
                group,
                superseded,
                status,
                instances: reports,
                started_at,
                completed_at: Utc::now(),
            })
        });

        RunHandle {
            run_id,
            group: plan.group,
            superseded,
            token,
            handle,
        }
    }

    /// Start a run and wait for its report
    pub async fn dispatch(
        &self,
        workflow: &Workflow,
        event: Event,
    ) -> Result<Option<RunReport>, RunnerError> {
        match self.start(workflow, event) {
            Some(handle) => handle.wait().await.map(Some),
            None => Ok(None),
        }
    }

    /// Cancel every run started by this engine
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
