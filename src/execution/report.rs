//! Run plans and run reports

use crate::core::{Event, InstanceReport, InstanceStatus, RunInstance, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a triggering event would start, computed without side effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPlan {
    pub run_id: Uuid,
    pub workflow: String,
    pub event: Event,
    /// Rendered concurrency group key
    pub group: Option<String>,
    pub instances: Vec<RunInstance>,
}

/// Final outcome of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub workflow: String,
    pub event: Event,
    pub group: Option<String>,
    /// Run this one cancelled when it started
    pub superseded: Option<Uuid>,
    pub status: RunStatus,
    /// Instance reports ordered by instance index
    pub instances: Vec<InstanceReport>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Find an instance report by label or runner label
    pub fn instance(&self, label: &str) -> Option<&InstanceReport> {
        self.instances
            .iter()
            .find(|i| i.label == label || i.runs_on == label)
    }

    pub fn count_with_status(&self, status: InstanceStatus) -> usize {
        self.instances.iter().filter(|i| i.status == status).count()
    }

    pub fn succeeded_instances(&self) -> usize {
        self.count_with_status(InstanceStatus::Succeeded)
    }

    pub fn duration(&self) -> std::time::Duration {
        self.completed_at
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}
