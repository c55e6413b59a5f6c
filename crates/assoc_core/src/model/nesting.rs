//! Nesting specification for eager retrieval.
//!
//! A nesting spec is a tree. Each node names one relation (by alias or
//! target kind) reachable from its parent node's kind. A node without
//! children ends the recursion.

use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestingSpec {
    includes: Vec<(String, NestingSpec)>,
}

impl NestingSpec {
    /// Empty spec: roots only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces, keeping its position) one nested relation.
    pub fn include(mut self, name: impl Into<String>, nested: NestingSpec) -> Self {
        let name = name.into();
        match self.includes.iter_mut().find(|(current, _)| *current == name) {
            Some(slot) => slot.1 = nested,
            None => self.includes.push((name, nested)),
        }
        self
    }

    pub fn includes(&self) -> &[(String, NestingSpec)] {
        &self.includes
    }

    pub fn is_leaf(&self) -> bool {
        self.includes.is_empty()
    }

    /// Number of relation levels below this node. A leaf has depth 0.
    pub fn depth(&self) -> usize {
        self.includes
            .iter()
            .map(|(_, nested)| nested.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Parses `{"documents": {"annotations": {}}}`.
    ///
    /// `true` is accepted as a leaf node. Any other node value is rejected.
    pub fn from_json(value: &Value) -> Result<Self, NestingParseError> {
        parse_node(value, "")
    }
}

fn parse_node(value: &Value, path: &str) -> Result<NestingSpec, NestingParseError> {
    match value {
        Value::Bool(true) => Ok(NestingSpec::new()),
        Value::Object(entries) => {
            let mut spec = NestingSpec::new();
            for (name, nested) in entries {
                let child_path = join_path(path, name);
                spec = spec.include(name.clone(), parse_node(nested, &child_path)?);
            }
            Ok(spec)
        }
        _ => Err(NestingParseError {
            path: if path.is_empty() {
                "<root>".to_string()
            } else {
                path.to_string()
            },
        }),
    }
}

/// Joins nesting path segments with `.`.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

/// Nesting spec JSON has a node that is neither an object nor `true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestingParseError {
    pub path: String,
}

impl Display for NestingParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "nesting node `{}` must be an object", self.path)
    }
}

impl Error for NestingParseError {}
