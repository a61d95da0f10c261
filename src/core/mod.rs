//! Core domain models for the workflow runner
//!
//! This module defines the workflow definition, trigger policy, matrix
//! expansion and the run instances produced from them.

pub mod config;
pub mod context;
pub mod expression;
pub mod instance;
pub mod matrix;
pub mod state;
pub mod trigger;
pub mod workflow;

pub use context::*;
pub use instance::*;
pub use state::*;
pub use trigger::{Event, EventKind, TriggerPolicy};
pub use workflow::*;
