//! Workflow configuration from YAML

use crate::core::{expression, matrix::Matrix, Workflow};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// The build-verification workflow shipped with the runner
pub const BUNDLED_WORKFLOW: &str = include_str!("../../workflows/rust.yml");

/// Action names `uses:` may refer to
pub const CHECKOUT_ACTION: &str = "actions/checkout";

/// Hosted runners cancel jobs after six hours unless told otherwise
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 360;

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    pub name: String,

    /// Events that trigger the workflow
    #[serde(rename = "on")]
    pub triggers: TriggerConfig,

    /// Concurrency group for superseding in-flight runs
    #[serde(default)]
    pub concurrency: Option<ConcurrencyConfig>,

    /// Environment exported to every step
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Jobs keyed by job id
    pub jobs: BTreeMap<String, JobConfig>,
}

/// `on:` block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default, deserialize_with = "present_filter")]
    pub push: Option<BranchFilterConfig>,

    #[serde(default, deserialize_with = "present_filter")]
    pub pull_request: Option<BranchFilterConfig>,
}

/// A bare `push:` key (YAML null) still declares the trigger
fn present_filter<'de, D>(deserializer: D) -> Result<Option<BranchFilterConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let filter: Option<BranchFilterConfig> = Option::deserialize(deserializer)?;
    Ok(Some(filter.unwrap_or_default()))
}

/// Branch filter of a trigger; no branches means any branch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchFilterConfig {
    #[serde(default)]
    pub branches: Vec<String>,
}

/// `concurrency:` block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConcurrencyConfig {
    /// Group expression, e.g. `${{ github.workflow }}-${{ github.sha }}`
    pub group: String,

    /// Whether a new run cancels the in-flight run of the same group
    #[serde(default)]
    pub cancel_in_progress: bool,
}

/// Job configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobConfig {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Runner label, usually `${{ matrix.os }}`
    pub runs_on: String,

    /// Wall-clock limit for a whole run instance
    #[serde(default)]
    pub timeout_minutes: Option<u64>,

    #[serde(default)]
    pub strategy: Option<StrategyConfig>,

    /// Environment exported to every step of the job
    #[serde(default)]
    pub env: HashMap<String, String>,

    pub steps: Vec<StepConfig>,
}

/// `strategy:` block of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StrategyConfig {
    #[serde(default)]
    pub matrix: Option<Mapping>,

    /// Maximum number of instances of this job running at once
    #[serde(default)]
    pub max_parallel: Option<usize>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StepConfig {
    /// Optional step identifier
    #[serde(default)]
    pub id: Option<String>,

    /// Human-readable step name
    #[serde(default)]
    pub name: Option<String>,

    /// Action reference, e.g. `actions/checkout@v4`
    #[serde(default)]
    pub uses: Option<String>,

    /// Shell script to run
    #[serde(default)]
    pub run: Option<String>,

    /// Step-level environment
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Directory relative to the workspace
    #[serde(default)]
    pub working_directory: Option<String>,
}

impl StepConfig {
    /// Name shown in output, following the hosted runner's convention
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if let Some(uses) = &self.uses {
            return format!("Run {}", uses);
        }
        let first_line = self
            .run
            .as_deref()
            .and_then(|run| run.lines().find(|l| !l.trim().is_empty()))
            .unwrap_or_default();
        format!("Run {}", first_line.trim())
    }
}

impl JobConfig {
    /// Parsed matrix, or `None` when the job has no strategy matrix
    pub fn matrix(&self) -> Result<Option<Matrix>> {
        match self.strategy.as_ref().and_then(|s| s.matrix.as_ref()) {
            Some(mapping) => Ok(Some(Matrix::from_mapping(mapping)?)),
            None => Ok(None),
        }
    }
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// The workflow shipped with the runner
    pub fn bundled() -> Result<Self> {
        Self::from_yaml(BUNDLED_WORKFLOW).context("Bundled workflow is invalid")
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<()> {
        if self.triggers.push.is_none() && self.triggers.pull_request.is_none() {
            bail!("Workflow '{}' declares no push or pull_request trigger", self.name);
        }

        if self.jobs.is_empty() {
            bail!("Workflow '{}' has no jobs", self.name);
        }

        if let Some(concurrency) = &self.concurrency {
            if concurrency.group.trim().is_empty() {
                bail!("Concurrency group must not be empty");
            }
        }

        for (job_id, job) in &self.jobs {
            if job.steps.is_empty() {
                bail!("Job '{}' has no steps", job_id);
            }

            if job.timeout_minutes == Some(0) {
                bail!("Job '{}' timeout-minutes must be greater than zero", job_id);
            }

            let matrix = job
                .matrix()
                .with_context(|| format!("Job '{}' has an invalid matrix", job_id))?;
            let matrix_keys = matrix.as_ref().map(|m| m.keys()).unwrap_or_default();
            if let Some(matrix) = &matrix {
                if matrix.combinations().is_empty() {
                    bail!("Job '{}' matrix expands to no combinations", job_id);
                }
            }

            let mut templates: Vec<&str> = vec![job.runs_on.as_str()];
            templates.extend(job.env.values().map(String::as_str));

            for (index, step) in job.steps.iter().enumerate() {
                let label = step.display_name();
                match (&step.uses, &step.run) {
                    (Some(_), Some(_)) => {
                        bail!("Job '{}' step {} ('{}') sets both uses and run", job_id, index + 1, label)
                    }
                    (None, None) => {
                        bail!("Job '{}' step {} ('{}') sets neither uses nor run", job_id, index + 1, label)
                    }
                    (Some(uses), None) => {
                        let action = uses.split('@').next().unwrap_or_default();
                        if action != CHECKOUT_ACTION {
                            bail!("Job '{}' step {} uses unsupported action '{}'", job_id, index + 1, uses);
                        }
                    }
                    (None, Some(_)) => {}
                }

                templates.extend(step.run.as_deref());
                templates.extend(step.name.as_deref());
                templates.extend(step.working_directory.as_deref());
                templates.extend(step.env.values().map(String::as_str));
            }

            for template in templates {
                for path in expression::referenced_paths(template) {
                    if let Some(key) = path.strip_prefix("matrix.") {
                        if !matrix_keys.iter().any(|k| k == key) {
                            bail!(
                                "Job '{}' references undefined matrix key '{}'",
                                job_id,
                                key
                            );
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Convert config to a Workflow domain model
    pub fn to_workflow(&self) -> Result<Workflow> {
        Workflow::from_config(self)
    }
}
