//! Build matrix - axes, include/exclude and cross-product expansion

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// One concrete assignment of matrix keys to values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixCombination(Vec<(String, String)>);

impl MatrixCombination {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// Key/value pairs in axis order
    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `ubuntu-latest, stable` style label
    pub fn label(&self) -> String {
        self.0
            .iter()
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn set(&mut self, key: &str, value: &str) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.0.push((key.to_string(), value.to_string())),
        }
    }

    fn contains_all(&self, pairs: &[(String, String)]) -> bool {
        pairs.iter().all(|(k, v)| self.get(k) == Some(v.as_str()))
    }
}

/// Parsed matrix definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matrix {
    /// Axes in declaration order
    pub axes: Vec<(String, Vec<String>)>,
    pub include: Vec<Vec<(String, String)>>,
    pub exclude: Vec<Vec<(String, String)>>,
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_entries(key: &str, value: &Value) -> Result<Vec<Vec<(String, String)>>> {
    let Some(entries) = value.as_sequence() else {
        bail!("matrix '{}' must be a list of mappings", key);
    };

    entries
        .iter()
        .map(|entry| {
            let Some(map) = entry.as_mapping() else {
                bail!("matrix '{}' entries must be mappings", key);
            };
            map.iter()
                .map(|(k, v)| {
                    let name = k.as_str().unwrap_or_default().to_string();
                    match scalar_to_string(v) {
                        Some(value) => Ok((name, value)),
                        None => bail!("matrix '{}' value for '{}' must be a scalar", key, name),
                    }
                })
                .collect()
        })
        .collect()
}

impl Matrix {
    /// Parse the `strategy.matrix` mapping of a job
    pub fn from_mapping(mapping: &Mapping) -> Result<Self> {
        let mut matrix = Matrix::default();

        for (key, value) in mapping {
            let Some(name) = key.as_str() else {
                bail!("matrix keys must be strings");
            };

            match name {
                "include" => matrix.include = parse_entries(name, value)?,
                "exclude" => matrix.exclude = parse_entries(name, value)?,
                _ => {
                    let Some(items) = value.as_sequence() else {
                        bail!("matrix axis '{}' must be a list", name);
                    };
                    if items.is_empty() {
                        bail!("matrix axis '{}' has no values", name);
                    }
                    let values = items
                        .iter()
                        .map(|item| match scalar_to_string(item) {
                            Some(v) => Ok(v),
                            None => bail!("matrix axis '{}' must contain only scalar values", name),
                        })
                        .collect::<Result<Vec<_>>>()?;
                    matrix.axes.push((name.to_string(), values));
                }
            }
        }

        Ok(matrix)
    }

    /// Every key a combination of this matrix may define
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.axes.iter().map(|(k, _)| k.clone()).collect();
        for (key, _) in self.include.iter().flatten() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    fn is_axis(&self, key: &str) -> bool {
        self.axes.iter().any(|(k, _)| k == key)
    }

    /// Expand into concrete combinations
    ///
    /// Axes expand to their cross product. `exclude` entries drop every
    /// combination they fully match. An `include` entry extends each
    /// combination whose axis values it matches, and is appended as a new
    /// combination when it matches none.
    pub fn combinations(&self) -> Vec<MatrixCombination> {
        let mut combinations = if self.axes.is_empty() {
            Vec::new()
        } else {
            let mut acc = vec![MatrixCombination::default()];
            for (key, values) in &self.axes {
                acc = acc
                    .into_iter()
                    .flat_map(|combo| {
                        values.iter().map(move |value| {
                            let mut next = combo.clone();
                            next.set(key, value);
                            next
                        })
                    })
                    .collect();
            }
            acc
        };

        combinations.retain(|combo| !self.exclude.iter().any(|ex| combo.contains_all(ex)));

        for entry in &self.include {
            let (axis_pairs, extra_pairs): (Vec<_>, Vec<_>) =
                entry.iter().cloned().partition(|(k, _)| self.is_axis(k));

            let mut matched = false;
            if !combinations.is_empty() {
                for combo in combinations.iter_mut() {
                    if combo.contains_all(&axis_pairs) {
                        for (k, v) in &extra_pairs {
                            combo.set(k, v);
                        }
                        matched = true;
                    }
                }
            }

            if !matched {
                combinations.push(MatrixCombination::from_pairs(entry.clone()));
            }
        }

        combinations
    }
}
