//! Host runner settings

use std::path::PathBuf;

/// Configuration for the host step runner
#[derive(Debug, Clone)]
pub struct HostSettings {
    /// Directory under which every instance gets its own workspace
    pub workspace_root: PathBuf,

    /// Repository to clone for checkout steps (path or URL)
    ///
    /// If not provided, checkout steps fail.
    pub repository: Option<String>,

    /// Shell program and arguments; the script is appended as the last argument
    pub shell: Vec<String>,

    /// Path to the git executable
    pub git_path: String,

    /// Keep instance workspaces after the instance finishes
    pub keep_workspaces: bool,
}

/// Default shell invocation, matching what hosted runners use
pub fn default_shell() -> Vec<String> {
    let args: &[&str] = if cfg!(windows) {
        &["pwsh", "-NoLogo", "-NoProfile", "-NonInteractive", "-Command"]
    } else {
        &["bash", "--noprofile", "--norc", "-eo", "pipefail", "-c"]
    };
    args.iter().map(|s| s.to_string()).collect()
}

impl Default for HostSettings {
    fn default() -> Self {
        let workspace_root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("ci-runner")
            .join("work");

        Self {
            workspace_root,
            repository: None,
            shell: default_shell(),
            git_path: "git".to_string(),
            keep_workspaces: false,
        }
    }
}

impl HostSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative roots are resolved against the current directory
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.workspace_root = if root.is_relative() {
            std::env::current_dir().map(|cwd| cwd.join(&root)).unwrap_or(root)
        } else {
            root
        };
        self
    }

    /// Repositories that exist on disk are stored as absolute paths, since
    /// checkout runs from inside the instance directory. URLs are kept as is.
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        let repository = repository.into();
        self.repository = Some(match std::fs::canonicalize(&repository) {
            Ok(path) => path.display().to_string(),
            Err(_) => repository,
        });
        self
    }

    pub fn with_shell(mut self, shell: Vec<String>) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_git_path(mut self, git_path: impl Into<String>) -> Self {
        self.git_path = git_path.into();
        self
    }

    pub fn keep_workspaces(mut self, keep: bool) -> Self {
        self.keep_workspaces = keep;
        self
    }
}
