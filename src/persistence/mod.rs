//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

pub use crate::core::RunStatus;
use crate::core::InstanceStatus;
use crate::execution::RunReport;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Workflow name
    pub workflow: String,

    /// Triggering event kind (`push`, `pull_request`)
    pub event: String,

    pub branch: String,

    pub sha: Option<String>,

    /// Concurrency group key
    pub group: Option<String>,

    pub status: RunStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    pub total_instances: usize,

    pub succeeded_instances: usize,

    /// Failed or timed out
    pub failed_instances: usize,

    pub cancelled_instances: usize,
}

impl RunSummary {
    /// Build a summary from a run report
    pub fn from_report(report: &RunReport) -> Self {
        Self {
            run_id: report.run_id,
            workflow: report.workflow.clone(),
            event: report.event.kind.to_string(),
            branch: report.event.branch.clone(),
            sha: report.event.sha.clone(),
            group: report.group.clone(),
            status: report.status,
            started_at: report.started_at,
            completed_at: Some(report.completed_at),
            total_instances: report.instances.len(),
            succeeded_instances: report.succeeded_instances(),
            failed_instances: report.count_with_status(InstanceStatus::Failed)
                + report.count_with_status(InstanceStatus::TimedOut),
            cancelled_instances: report.count_with_status(InstanceStatus::Cancelled),
        }
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run summary, replacing an earlier one with the same ID
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List all runs of a workflow, newest first
    async fn list_runs(&self, workflow: &str) -> Result<Vec<RunSummary>>;

    /// The `limit` most recent runs of any workflow
    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>>;

    /// List all workflow names
    async fn list_workflows(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut runs: Vec<RunSummary>) -> Vec<RunSummary> {
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        self.runs.write().await.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, workflow: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(Self::newest_first(
            runs.values()
                .filter(|r| r.workflow == workflow)
                .cloned()
                .collect(),
        ))
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut runs = Self::newest_first(runs.values().cloned().collect());
        runs.truncate(limit);
        Ok(runs)
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut names: Vec<String> = runs.values().map(|r| r.workflow.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
