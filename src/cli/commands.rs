//! CLI command definitions

use crate::core::{config::WorkflowConfig, Event, EventKind, Workflow};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Which workflow to load and which event to feed it
#[derive(Debug, Args, Clone)]
pub struct EventArgs {
    /// Path to workflow YAML file (defaults to the bundled Rust workflow)
    #[arg(short, long)]
    pub file: Option<String>,

    /// Event kind (push, pull_request, ...)
    #[arg(long, default_value = "push")]
    pub event: String,

    /// Pushed branch, or the base branch of a pull request
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Revision the event refers to
    ///
    /// `run` defaults to the HEAD of --repository. Without a revision the
    /// revision part of the concurrency key is empty.
    #[arg(long)]
    pub sha: Option<String>,

    /// Pull request number
    #[arg(long)]
    pub pr: Option<u64>,
}

impl EventArgs {
    /// Load and validate the selected workflow
    pub fn load_workflow(&self) -> Result<Workflow> {
        let config = match &self.file {
            Some(path) => WorkflowConfig::from_file(path)
                .with_context(|| format!("Failed to load workflow {}", path))?,
            None => WorkflowConfig::bundled()?,
        };
        config.to_workflow()
    }

    pub fn to_event(&self, repository: Option<&str>) -> Event {
        let kind = self
            .event
            .parse::<EventKind>()
            .unwrap_or_else(|never| match never {});
        Event {
            kind,
            branch: self.branch.clone(),
            sha: self.sha.clone(),
            pull_request: self.pr,
            repository: repository.map(str::to_string),
        }
    }
}

/// Run a workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    #[command(flatten)]
    pub event: EventArgs,

    /// Repository to check out (path or URL)
    #[arg(long, default_value = ".")]
    pub repository: String,

    /// Root directory for instance workspaces
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Keep instance workspaces after the run
    #[arg(long)]
    pub keep_workspaces: bool,

    /// Override every job's timeout
    #[arg(long)]
    pub timeout_minutes: Option<u64>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Show what an event would run
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    #[command(flatten)]
    pub event: EventArgs,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate a workflow file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Workflow name to filter by
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show a single run
    #[arg(long)]
    pub run_id: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
