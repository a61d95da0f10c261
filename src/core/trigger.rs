//! Repository events and the trigger policy that gates runs

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of repository event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
    /// Any other event name (never triggers the runner)
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
            EventKind::Other(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "push" => EventKind::Push,
            "pull_request" => EventKind::PullRequest,
            other => EventKind::Other(other.to_string()),
        })
    }
}

/// An incoming repository event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event kind
    pub kind: EventKind,

    /// Pushed branch, or the base branch a pull request targets
    pub branch: String,

    /// Revision identifier
    #[serde(default)]
    pub sha: Option<String>,

    /// Pull request number (pull_request events only)
    #[serde(default)]
    pub pull_request: Option<u64>,

    /// Repository name or location, informational
    #[serde(default)]
    pub repository: Option<String>,
}

impl Event {
    pub fn push(branch: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Push,
            branch: branch.into(),
            sha: Some(sha.into()),
            pull_request: None,
            repository: None,
        }
    }

    pub fn pull_request(base_branch: impl Into<String>, number: u64, sha: impl Into<String>) -> Self {
        Self {
            kind: EventKind::PullRequest,
            branch: base_branch.into(),
            sha: Some(sha.into()),
            pull_request: Some(number),
            repository: None,
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// The git ref this event points at
    pub fn git_ref(&self) -> String {
        match (&self.kind, self.pull_request) {
            (EventKind::PullRequest, Some(number)) => format!("refs/pull/{}/merge", number),
            _ => format!("refs/heads/{}", self.branch),
        }
    }
}

/// Branch name pattern with `*` / `**` wildcards
#[derive(Debug, Clone)]
pub struct BranchPattern {
    source: String,
    regex: Option<Regex>,
}

impl BranchPattern {
    pub fn new(pattern: &str) -> Self {
        let regex = if pattern.contains('*') {
            let mut translated = String::from("^");
            let mut rest = pattern;
            while !rest.is_empty() {
                if let Some(after) = rest.strip_prefix("**") {
                    translated.push_str(".*");
                    rest = after;
                } else if let Some(after) = rest.strip_prefix('*') {
                    translated.push_str("[^/]*");
                    rest = after;
                } else {
                    let ch = rest.chars().next().unwrap_or_default();
                    translated.push_str(&regex::escape(&ch.to_string()));
                    rest = &rest[ch.len_utf8()..];
                }
            }
            translated.push('$');
            Regex::new(&translated).ok()
        } else {
            None
        };

        Self {
            source: pattern.to_string(),
            regex,
        }
    }

    pub fn matches(&self, branch: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(branch),
            None => self.source == branch,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// One (event kind, branch patterns) pair of the trigger policy
#[derive(Debug, Clone)]
pub struct TriggerRule {
    pub kind: EventKind,
    /// Empty means every branch
    pub branches: Vec<BranchPattern>,
}

impl TriggerRule {
    pub fn matches(&self, event: &Event) -> bool {
        self.kind == event.kind
            && (self.branches.is_empty() || self.branches.iter().any(|b| b.matches(&event.branch)))
    }
}

/// Set of rules deciding which events start a run
#[derive(Debug, Clone, Default)]
pub struct TriggerPolicy {
    pub rules: Vec<TriggerRule>,
}

impl TriggerPolicy {
    /// Whether `event` matches at least one rule
    ///
    /// Only push and pull_request rules are ever built, so other event kinds
    /// never match.
    pub fn matches(&self, event: &Event) -> bool {
        self.rules.iter().any(|rule| rule.matches(event))
    }
}
