//! `${{ ... }}` expression rendering
//!
//! Only the subset of the expression language that workflow files in this
//! repository need is understood: dotted context paths (`github.sha`,
//! `matrix.os`), single-quoted string literals, number literals and the `||`
//! fallback operator. Anything a path does not resolve to renders as an empty
//! string.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{\{\s*(.*?)\s*\}\}").expect("placeholder pattern is a valid regex")
    })
}

/// A single operand of an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Dotted context path, e.g. `github.event.pull_request.number`
    Path(String),
    /// Quoted or numeric literal
    Literal(String),
}

impl Operand {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
            return Operand::Literal(raw[1..raw.len() - 1].replace("''", "'"));
        }
        if !raw.is_empty() && raw.parse::<f64>().is_ok() {
            return Operand::Literal(raw.to_string());
        }
        Operand::Path(raw.to_string())
    }

    fn resolve(&self, values: &HashMap<String, String>) -> String {
        match self {
            Operand::Literal(value) => value.clone(),
            Operand::Path(path) => values.get(path).cloned().unwrap_or_default(),
        }
    }
}

/// Split an expression on top-level `||`, ignoring operators inside quotes
fn split_or(expr: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    let bytes = expr.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quotes = !in_quotes,
            b'|' if !in_quotes && bytes.get(i + 1) == Some(&b'|') => {
                parts.push(&expr[start..i]);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&expr[start..]);
    parts
}

/// Parse an expression body (the part between `${{` and `}}`)
pub fn parse(expr: &str) -> Vec<Operand> {
    split_or(expr).into_iter().map(Operand::parse).collect()
}

/// Evaluate an expression body against a flat context
///
/// `a || b` yields the first operand that resolves to a non-empty string.
pub fn evaluate(expr: &str, values: &HashMap<String, String>) -> String {
    let mut last = String::new();
    for operand in parse(expr) {
        let value = operand.resolve(values);
        if !value.is_empty() {
            return value;
        }
        last = value;
    }
    last
}

/// Replace every `${{ expr }}` placeholder in `template`
pub fn render(template: &str, values: &HashMap<String, String>) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &regex::Captures| evaluate(&caps[1], values))
        .into_owned()
}

/// All context paths referenced by placeholders in `template`
pub fn referenced_paths(template: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(template)
        .flat_map(|caps| parse(&caps[1]))
        .filter_map(|operand| match operand {
            Operand::Path(path) => Some(path),
            Operand::Literal(_) => None,
        })
        .collect()
}
