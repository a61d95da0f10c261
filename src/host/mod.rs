//! Step runners - the seam between the engine and external programs

pub mod checkout;
pub mod outcome;
pub mod process;
pub mod settings;

use crate::core::{workflow::runner_os_for_label, ResolvedStep, RunInstance, StepAction};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use outcome::{RunnerError, StepOutput};
pub use process::ProcessLauncher;
pub use settings::HostSettings;

/// Where and with what environment a step runs
#[derive(Debug, Clone)]
pub struct StepEnvironment {
    pub run_id: Uuid,

    /// Label of the owning instance
    pub instance: String,

    /// Instance workspace (the checkout directory)
    pub workspace: PathBuf,

    /// Instance env merged with step env
    pub env: HashMap<String, String>,
}

/// Trait for step execution - allows for different implementations
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Create the isolated workspace of an instance
    async fn prepare(&self, run_id: Uuid, instance: &RunInstance) -> Result<PathBuf, RunnerError>;

    /// Run one step to completion
    ///
    /// A non-zero exit code is reported through `StepOutput`, not as an error.
    async fn run_step(
        &self,
        step: &ResolvedStep,
        env: &StepEnvironment,
    ) -> Result<StepOutput, RunnerError>;

    /// Release the workspace after the instance finished
    async fn finish(&self, _workspace: &Path) -> Result<(), RunnerError> {
        Ok(())
    }
}

fn host_os() -> &'static str {
    match std::env::consts::OS {
        "windows" => "Windows",
        "macos" => "macOS",
        _ => "Linux",
    }
}

/// Runs steps as local processes, one workspace directory per instance
#[derive(Debug, Clone)]
pub struct HostRunner {
    settings: HostSettings,
    launcher: ProcessLauncher,
}

impl HostRunner {
    /// Create a new host runner
    pub fn new(settings: HostSettings) -> Self {
        Self {
            settings,
            launcher: ProcessLauncher::new(),
        }
    }

    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    /// Current `HEAD` revision of the configured repository
    pub async fn head_revision(&self) -> Option<String> {
        let repository = self.settings.repository.as_deref()?;
        checkout::head_revision(&self.launcher, &self.settings.git_path, repository).await
    }

    /// `<root>/<run-id>/<NN-label>/repo`
    ///
    /// The extra `repo` level keeps relative paths such as `../deps` inside
    /// the instance's own directory.
    pub fn workspace_for(&self, run_id: Uuid, instance: &RunInstance) -> PathBuf {
        self.settings
            .workspace_root
            .join(run_id.to_string())
            .join(instance.slug())
            .join("repo")
    }
}

#[async_trait]
impl StepRunner for HostRunner {
    async fn prepare(&self, run_id: Uuid, instance: &RunInstance) -> Result<PathBuf, RunnerError> {
        let expected_os = runner_os_for_label(&instance.runs_on);
        if expected_os != host_os() {
            warn!(
                "{} targets {} ({}) but runs on this {} host",
                instance.label,
                instance.runs_on,
                expected_os,
                host_os()
            );
        }

        let workspace = self.workspace_for(run_id, instance);
        tokio::fs::create_dir_all(&workspace).await?;
        debug!("Prepared workspace {}", workspace.display());
        Ok(workspace)
    }

    async fn run_step(
        &self,
        step: &ResolvedStep,
        env: &StepEnvironment,
    ) -> Result<StepOutput, RunnerError> {
        match &step.action {
            StepAction::Checkout { reference } => {
                let repository = self.settings.repository.as_deref().ok_or_else(|| {
                    RunnerError::Checkout(format!("no repository configured for {}", reference))
                })?;
                let revision = env.env.get("GITHUB_SHA").map(String::as_str);
                checkout::checkout(
                    &self.launcher,
                    &self.settings.git_path,
                    repository,
                    &env.workspace,
                    revision,
                    &env.env,
                )
                .await
            }
            StepAction::Run { script } => {
                let Some((program, base_args)) = self.settings.shell.split_first() else {
                    return Err(RunnerError::UnsupportedAction("empty shell command".to_string()));
                };
                let mut args = base_args.to_vec();
                args.push(script.clone());

                let cwd = match &step.working_directory {
                    Some(dir) => env.workspace.join(dir),
                    None => env.workspace.clone(),
                };

                info!("[{}] {}", env.instance, step.name);
                self.launcher.run(program, &args, &cwd, &env.env).await
            }
        }
    }

    async fn finish(&self, workspace: &Path) -> Result<(), RunnerError> {
        if self.settings.keep_workspaces {
            return Ok(());
        }
        // the instance directory also holds siblings such as ../deps
        if let Some(instance_dir) = workspace.parent() {
            if instance_dir.exists() {
                tokio::fs::remove_dir_all(instance_dir).await?;
            }
        }
        Ok(())
    }
}
