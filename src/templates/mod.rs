//! Per-instance configuration files rendered from shared templates.
//!
//! A [`SubstitutionMap`] is built once per start and applied to every
//! [`TemplateTarget`] by the [`generator::ConfigGenerator`].

pub mod generator;
pub mod substitute;

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Wrap a bare key in the placeholder delimiters: `port` -> `{{port}}`.
pub fn token(key: &str) -> String {
    format!("{{{{{key}}}}}")
}

/// Immutable token -> value mapping shared by all substitution tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubstitutionMap {
    entries: BTreeMap<String, String>,
}

impl SubstitutionMap {
    pub fn builder() -> SubstitutionMapBuilder {
        SubstitutionMapBuilder::default()
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries.get(token).map(String::as_str)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every occurrence of every token in `input`.
    pub fn render(&self, input: &str) -> String {
        let mut out = input.to_string();
        for (token, value) in &self.entries {
            if out.contains(token.as_str()) {
                out = out.replace(token.as_str(), value);
            }
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct SubstitutionMapBuilder {
    entries: BTreeMap<String, String>,
}

impl SubstitutionMapBuilder {
    /// Add `{{key}}` -> `value`. A later insert of the same key wins.
    pub fn insert(mut self, key: &str, value: impl ToString) -> Self {
        self.entries.insert(token(key), value.to_string());
        self
    }

    pub fn build(self) -> SubstitutionMap {
        SubstitutionMap {
            entries: self.entries,
        }
    }
}

/// Whether a target must be rendered, or may be switched off per app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Mandatory,
    Optional { enabled: bool },
}

/// A file to render: read from `source` (or `path` itself when there is no
/// separate source), substitute, write to `path`, then check that none of
/// `tokens` survived.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateTarget {
    pub label: String,
    pub source: Option<PathBuf>,
    pub path: PathBuf,
    pub tokens: Vec<String>,
    pub requirement: Requirement,
}

impl TemplateTarget {
    /// A template rendered in place.
    pub fn in_place(label: &str, path: impl Into<PathBuf>, keys: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            source: None,
            path: path.into(),
            tokens: keys.iter().map(|k| token(k)).collect(),
            requirement: Requirement::Mandatory,
        }
    }

    /// A template copied from `source` into `path` while rendering.
    pub fn copied(
        label: &str,
        source: impl Into<PathBuf>,
        path: impl Into<PathBuf>,
        keys: &[&str],
    ) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::in_place(label, path, keys)
        }
    }

    pub fn optional(mut self, enabled: bool) -> Self {
        self.requirement = Requirement::Optional { enabled };
        self
    }

    pub fn is_mandatory(&self) -> bool {
        self.requirement == Requirement::Mandatory
    }

    pub fn is_disabled(&self) -> bool {
        self.requirement == Requirement::Optional { enabled: false }
    }

    /// Path the template content is read from.
    pub fn read_path(&self) -> &std::path::Path {
        self.source.as_deref().unwrap_or(&self.path)
    }
}
