//! Step outcome and error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for step runner operations
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Workspace error: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("Checkout failed: {0}")]
    Checkout(String),

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("Run task failed: {0}")]
    Join(String),
}

/// Captured result of an external program
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepOutput {
    /// Process exit code (-1 when terminated by a signal)
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,
}

impl StepOutput {
    /// Create a successful output with only stdout
    pub fn new(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Append another program's output (used by multi-command steps)
    pub fn append(&mut self, other: StepOutput) {
        self.stdout.push_str(&other.stdout);
        self.stderr.push_str(&other.stderr);
        self.exit_code = other.exit_code;
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}
