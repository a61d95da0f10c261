//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal or in-flight status of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// At least one instance is still running
    Running,
    /// Every instance succeeded
    Succeeded,
    /// At least one instance failed or timed out
    Failed,
    /// Superseded or cancelled, with no instance failing on its own
    Cancelled,
}

impl RunStatus {
    /// Conjunction over instance statuses
    ///
    /// A run succeeds only when every instance succeeded. Failures and
    /// timeouts outrank cancellation.
    pub fn aggregate<I>(statuses: I) -> RunStatus
    where
        I: IntoIterator<Item = InstanceStatus>,
    {
        let mut any_failed = false;
        let mut any_cancelled = false;
        let mut any_unfinished = false;

        for status in statuses {
            match status {
                InstanceStatus::Succeeded => {}
                InstanceStatus::Failed | InstanceStatus::TimedOut => any_failed = true,
                InstanceStatus::Cancelled => any_cancelled = true,
                InstanceStatus::Pending | InstanceStatus::Running => any_unfinished = true,
            }
        }

        if any_failed {
            RunStatus::Failed
        } else if any_cancelled {
            RunStatus::Cancelled
        } else if any_unfinished {
            RunStatus::Running
        } else {
            RunStatus::Succeeded
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Succeeded)
    }
}

/// Status of a single run instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Exceeded the job's wall-clock limit
    TimedOut,
    /// Superseded by a newer run of the same concurrency group
    Cancelled,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::Pending | InstanceStatus::Running)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InstanceStatus::Succeeded)
    }
}

/// State of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not run yet
    Pending,
    /// Step is currently running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Step exited with status zero
    Succeeded {
        output: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step exited non-zero, or could not be run at all
    Failed {
        error: String,
        exit_code: Option<i32>,
        output: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Instance deadline passed while this step was running
    TimedOut {
        started_at: DateTime<Utc>,
        stopped_at: DateTime<Utc>,
    },
    /// Instance was cancelled while this step was running
    Cancelled {
        started_at: DateTime<Utc>,
        stopped_at: DateTime<Utc>,
    },
    /// Never started because an earlier step ended the instance
    Skipped {
        reason: String,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepState::Pending | StepState::Running { .. })
    }

    /// Whether the step was actually started
    pub fn was_started(&self) -> bool {
        !matches!(self, StepState::Pending | StepState::Skipped { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepState::Succeeded { .. })
    }
}
