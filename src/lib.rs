//! ci-runner - run GitHub-style build workflows locally

pub mod cli;
pub mod core;
pub mod execution;
pub mod host;
pub mod persistence;

// Re-export commonly used types
pub use core::{Event, EventKind, InstanceStatus, RunInstance, RunStatus, StepState, Workflow};
pub use execution::{ExecutionEvent, RunHandle, RunReport, WorkflowEngine};
pub use host::{HostRunner, HostSettings, RunnerError, StepOutput, StepRunner};
