//! Workflow execution engine

pub mod concurrency;
pub mod engine;
pub mod executor;
pub mod report;

pub use concurrency::ConcurrencyRegistry;
pub use engine::{EventBus, EventHandler, ExecutionEvent, RunHandle, WorkflowEngine};
pub use executor::InstanceExecutor;
pub use report::{RunPlan, RunReport};
