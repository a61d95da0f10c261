//! Run instance - one job × matrix combination with fully rendered steps

use crate::core::{
    matrix::MatrixCombination,
    state::{InstanceStatus, StepState},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// What a step does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepAction {
    /// Shell script
    Run { script: String },
    /// Built-in source checkout (`uses: actions/checkout@...`)
    Checkout { reference: String },
}

/// A step with every expression already rendered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedStep {
    /// Position in the instance's step sequence (0-based)
    pub index: usize,

    /// Display name
    pub name: String,

    pub action: StepAction,

    /// Step-level environment, layered over the instance environment
    pub env: HashMap<String, String>,

    /// Directory relative to the workspace
    pub working_directory: Option<String>,
}

/// One independent unit of execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInstance {
    /// Position across the whole run (0-based)
    pub index: usize,

    pub job_id: String,

    /// `build (ubuntu-latest)` style label
    pub label: String,

    /// Rendered runner label
    pub runs_on: String,

    pub matrix: MatrixCombination,

    /// Wall-clock limit for the whole step sequence
    pub timeout: Duration,

    /// Environment exported to every step
    pub env: HashMap<String, String>,

    pub steps: Vec<ResolvedStep>,
}

impl RunInstance {
    /// Directory-safe identifier, unique within a run
    pub fn slug(&self) -> String {
        let sanitized: String = self
            .label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        let collapsed = sanitized
            .split('_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        format!("{:02}-{}", self.index, collapsed)
    }
}

/// Outcome of one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub name: String,
    pub state: StepState,
}

/// Outcome of one run instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceReport {
    pub index: usize,
    pub job_id: String,
    pub label: String,
    pub runs_on: String,
    pub matrix: MatrixCombination,
    pub status: InstanceStatus,
    pub steps: Vec<StepRecord>,
    /// Failure that happened outside any step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl InstanceReport {
    /// Fresh report with every step pending
    pub fn pending(instance: &RunInstance) -> Self {
        Self {
            index: instance.index,
            job_id: instance.job_id.clone(),
            label: instance.label.clone(),
            runs_on: instance.runs_on.clone(),
            matrix: instance.matrix.clone(),
            status: InstanceStatus::Pending,
            steps: instance
                .steps
                .iter()
                .map(|step| StepRecord {
                    index: step.index,
                    name: step.name.clone(),
                    state: StepState::Pending,
                })
                .collect(),
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Mark every step that has not started as skipped
    pub fn skip_remaining(&mut self, reason: &str) {
        for record in &mut self.steps {
            if matches!(record.state, StepState::Pending) {
                record.state = StepState::Skipped {
                    reason: reason.to_string(),
                };
            }
        }
    }

    /// Names of the steps that were actually started, in order
    pub fn started_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|r| r.state.was_started())
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Elapsed wall-clock time, if the instance finished
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => end.signed_duration_since(start).to_std().ok(),
            _ => None,
        }
    }
}
