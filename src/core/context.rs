//! Expression context - the values `${{ ... }}` placeholders resolve against

use crate::core::{expression, matrix::MatrixCombination, trigger::Event};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Flat context for a run or run instance
///
/// Keys are dotted paths such as `github.sha`, `matrix.os` or `env.CI`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpressionContext {
    values: HashMap<String, String>,
}

impl ExpressionContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Context describing a triggering event
    pub fn for_event(workflow_name: &str, event: &Event, run_id: Uuid) -> Self {
        let mut ctx = Self::new();
        ctx.set("github.workflow", workflow_name);
        ctx.set("github.event_name", event.kind.as_str());
        ctx.set("github.ref", &event.git_ref());
        ctx.set("github.ref_name", &event.branch);
        ctx.set("github.run_id", &run_id.to_string());

        if let Some(sha) = &event.sha {
            ctx.set("github.sha", sha);
        }
        if let Some(repository) = &event.repository {
            ctx.set("github.repository", repository);
        }
        if let Some(number) = event.pull_request {
            ctx.set("github.base_ref", &event.branch);
            ctx.set("github.event.pull_request.number", &number.to_string());
        }

        ctx
    }

    /// Set a value
    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    /// Get a value
    pub fn get(&self, key: &str) -> Option<&String> {
        self.values.get(key)
    }

    /// A copy of this context with `matrix.*` values added
    pub fn with_matrix(&self, combination: &MatrixCombination) -> Self {
        let mut ctx = self.clone();
        for (key, value) in combination.values() {
            ctx.set(&format!("matrix.{}", key), value);
        }
        ctx
    }

    /// A copy of this context with `env.*` values added
    pub fn with_env(&self, env: &HashMap<String, String>) -> Self {
        let mut ctx = self.clone();
        for (key, value) in env {
            ctx.set(&format!("env.{}", key), value);
        }
        ctx
    }

    /// Render a template, replacing every `${{ expr }}`
    pub fn render(&self, template: &str) -> String {
        expression::render(template, &self.values)
    }

    /// Render every value of a map
    pub fn render_map(&self, map: &HashMap<String, String>) -> HashMap<String, String> {
        map.iter()
            .map(|(k, v)| (k.clone(), self.render(v)))
            .collect()
    }
}
