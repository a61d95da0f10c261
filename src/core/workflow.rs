//! Workflow domain model

use crate::core::{
    config::{StepConfig, WorkflowConfig, DEFAULT_TIMEOUT_MINUTES},
    context::ExpressionContext,
    instance::{ResolvedStep, RunInstance, StepAction},
    matrix::{Matrix, MatrixCombination},
    trigger::{BranchPattern, Event, EventKind, TriggerPolicy, TriggerRule},
};
use anyhow::Result;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Concurrency group policy
#[derive(Debug, Clone)]
pub struct ConcurrencyPolicy {
    /// Group expression
    pub group: String,
    pub cancel_in_progress: bool,
}

impl ConcurrencyPolicy {
    /// Render the group key for a run
    pub fn group_key(&self, context: &ExpressionContext) -> String {
        context.render(&self.group)
    }
}

/// A job definition (steps are still templates)
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub name: Option<String>,
    pub runs_on: String,
    pub timeout: Duration,
    pub matrix: Option<Matrix>,
    pub max_parallel: Option<usize>,
    pub env: HashMap<String, String>,
    pub steps: Vec<StepConfig>,
}

impl Job {
    /// Matrix combinations, or a single empty combination without a matrix
    pub fn combinations(&self) -> Vec<MatrixCombination> {
        match &self.matrix {
            Some(matrix) => matrix.combinations(),
            None => vec![MatrixCombination::default()],
        }
    }
}

/// A workflow definition
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name, also `github.workflow` in expressions
    pub name: String,

    pub triggers: TriggerPolicy,

    pub concurrency: Option<ConcurrencyPolicy>,

    /// Workflow-level environment
    pub env: HashMap<String, String>,

    /// Jobs in id order
    pub jobs: Vec<Job>,
}

/// `RUNNER_OS` value for a runner label
pub fn runner_os_for_label(label: &str) -> &'static str {
    let label = label.to_ascii_lowercase();
    if label.contains("windows") {
        "Windows"
    } else if label.contains("macos") || label.contains("mac-") {
        "macOS"
    } else {
        "Linux"
    }
}

impl Workflow {
    /// Create a workflow from configuration
    pub fn from_config(config: &WorkflowConfig) -> Result<Self> {
        let mut rules = Vec::new();
        for (kind, filter) in [
            (EventKind::Push, &config.triggers.push),
            (EventKind::PullRequest, &config.triggers.pull_request),
        ] {
            if let Some(filter) = filter {
                rules.push(TriggerRule {
                    kind,
                    branches: filter.branches.iter().map(|b| BranchPattern::new(b)).collect(),
                });
            }
        }

        let jobs = config
            .jobs
            .iter()
            .map(|(id, job)| {
                Ok(Job {
                    id: id.clone(),
                    name: job.name.clone(),
                    runs_on: job.runs_on.clone(),
                    timeout: Duration::from_secs(
                        job.timeout_minutes.unwrap_or(DEFAULT_TIMEOUT_MINUTES) * 60,
                    ),
                    matrix: job.matrix()?,
                    max_parallel: job.strategy.as_ref().and_then(|s| s.max_parallel),
                    env: job.env.clone(),
                    steps: job.steps.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Workflow {
            name: config.name.clone(),
            triggers: TriggerPolicy { rules },
            concurrency: config.concurrency.as_ref().map(|c| ConcurrencyPolicy {
                group: c.group.clone(),
                cancel_in_progress: c.cancel_in_progress,
            }),
            env: config.env.clone(),
            jobs,
        })
    }

    /// Get a job by id
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Run-level expression context (event values plus workflow env)
    pub fn context(&self, event: &Event, run_id: Uuid) -> ExpressionContext {
        let base = ExpressionContext::for_event(&self.name, event, run_id);
        let env = base.render_map(&self.env);
        base.with_env(&env)
    }

    /// Concurrency group key for an event, if the workflow declares one
    pub fn group_key(&self, event: &Event, run_id: Uuid) -> Option<String> {
        let context = self.context(event, run_id);
        self.concurrency.as_ref().map(|c| c.group_key(&context))
    }

    /// Expand every job into its run instances
    pub fn expand(&self, event: &Event, run_id: Uuid) -> Vec<RunInstance> {
        let run_context = self.context(event, run_id);
        let workflow_env = run_context.render_map(&self.env);
        let mut instances = Vec::new();

        for job in &self.jobs {
            for combination in job.combinations() {
                let matrix_context = run_context.with_matrix(&combination);

                let mut env = workflow_env.clone();
                env.extend(matrix_context.render_map(&job.env));
                let mut context = matrix_context.with_env(&env);

                let runs_on = context.render(&job.runs_on);
                let runner_os = runner_os_for_label(&runs_on);
                context.set("runner.os", runner_os);

                let job_name = job
                    .name
                    .as_deref()
                    .map(|n| context.render(n))
                    .unwrap_or_else(|| job.id.clone());
                let label = if combination.is_empty() {
                    job_name
                } else {
                    format!("{} ({})", job_name, combination.label())
                };

                env.insert("CI".to_string(), "true".to_string());
                env.insert("RUNNER_OS".to_string(), runner_os.to_string());
                env.insert("GITHUB_WORKFLOW".to_string(), self.name.clone());
                env.insert("GITHUB_EVENT_NAME".to_string(), event.kind.to_string());
                env.insert("GITHUB_REF".to_string(), event.git_ref());
                if let Some(sha) = &event.sha {
                    env.insert("GITHUB_SHA".to_string(), sha.clone());
                }

                let steps = job
                    .steps
                    .iter()
                    .enumerate()
                    .map(|(index, step)| resolve_step(index, step, &context))
                    .collect();

                instances.push(RunInstance {
                    index: instances.len(),
                    job_id: job.id.clone(),
                    label,
                    runs_on,
                    matrix: combination,
                    timeout: job.timeout,
                    env,
                    steps,
                });
            }
        }

        instances
    }
}

fn resolve_step(index: usize, step: &StepConfig, context: &ExpressionContext) -> ResolvedStep {
    let action = match (&step.uses, &step.run) {
        (Some(uses), _) => StepAction::Checkout {
            reference: uses.clone(),
        },
        (None, run) => StepAction::Run {
            script: context.render(run.as_deref().unwrap_or_default()),
        },
    };

    ResolvedStep {
        index,
        name: context.render(&step.display_name()),
        action,
        env: context.render_map(&step.env),
        working_directory: step.working_directory.as_deref().map(|d| context.render(d)),
    }
}
