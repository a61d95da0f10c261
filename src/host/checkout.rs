//! Built-in source checkout

use crate::host::{process::ProcessLauncher, RunnerError, StepOutput};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Clone `repository` into `workspace` and detach at `revision` if given
///
/// `workspace` must be empty or missing. A failing git command ends the
/// checkout early and its output is returned with the non-zero exit code.
pub async fn checkout(
    launcher: &ProcessLauncher,
    git: &str,
    repository: &str,
    workspace: &Path,
    revision: Option<&str>,
    env: &HashMap<String, String>,
) -> Result<StepOutput, RunnerError> {
    let parent = workspace
        .parent()
        .ok_or_else(|| RunnerError::Checkout(format!("{} has no parent", workspace.display())))?;

    info!("Checking out {} into {}", repository, workspace.display());

    let mut output = launcher
        .run(
            git,
            &[
                "clone".to_string(),
                "--quiet".to_string(),
                repository.to_string(),
                workspace.display().to_string(),
            ],
            parent,
            env,
        )
        .await?;

    if !output.success() {
        return Ok(output);
    }

    if let Some(revision) = revision.filter(|r| !r.is_empty()) {
        let detach = launcher
            .run(
                git,
                &[
                    "checkout".to_string(),
                    "--quiet".to_string(),
                    "--detach".to_string(),
                    revision.to_string(),
                ],
                workspace,
                env,
            )
            .await?;
        output.append(detach);
    }

    Ok(output)
}

/// Revision that `HEAD` of `repository` points to
///
/// Works for local paths and remote URLs alike. Returns `None` when git
/// cannot resolve it, e.g. for a repository without commits.
pub async fn head_revision(launcher: &ProcessLauncher, git: &str, repository: &str) -> Option<String> {
    let args = ["ls-remote".to_string(), repository.to_string(), "HEAD".to_string()];
    let output = launcher
        .run(git, &args, Path::new("."), &HashMap::new())
        .await
        .ok()?;
    if !output.success() {
        return None;
    }
    output
        .stdout
        .split_whitespace()
        .next()
        .map(str::to_string)
}
