//! Entity registry and relation graph.
//!
//! # Responsibility
//! - Record entity kinds and their attribute schema exactly once.
//! - Bind one-to-many relations and their foreign keys.
//! - Resolve nesting specs into fetch plans.
//!
//! # Invariants
//! - Construction errors are returned before a `RelationGraph` exists.
//! - A built `RelationGraph` is immutable and acyclic.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod entity_registry;
pub mod relation_graph;

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Registry/graph construction failure. Fatal to startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    DuplicateEntityKind(String),
    UnknownEntityKind(String),
    DuplicateRelation {
        source: String,
        target: String,
    },
    CyclicRelation {
        source: String,
        target: String,
    },
    /// Kind, attribute, foreign key or alias name breaks naming rules.
    InvalidName(String),
    ReservedAttribute {
        kind: String,
        attribute: String,
    },
    DuplicateAttribute {
        kind: String,
        attribute: String,
    },
    /// Foreign key or alias collides with an existing name on that kind.
    NameConflict {
        kind: String,
        name: String,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateEntityKind(kind) => write!(f, "entity kind already registered: {kind}"),
            Self::UnknownEntityKind(kind) => write!(f, "unknown entity kind: {kind}"),
            Self::DuplicateRelation { source, target } => {
                write!(f, "relation already declared: {source} -> {target}")
            }
            Self::CyclicRelation { source, target } => {
                write!(f, "relation would create a cycle: {source} -> {target}")
            }
            Self::InvalidName(name) => write!(f, "invalid name: `{name}`"),
            Self::ReservedAttribute { kind, attribute } => {
                write!(f, "attribute `{attribute}` on `{kind}` is reserved")
            }
            Self::DuplicateAttribute { kind, attribute } => {
                write!(f, "attribute `{attribute}` declared twice on `{kind}`")
            }
            Self::NameConflict { kind, name } => {
                write!(f, "name `{name}` already used on `{kind}`")
            }
        }
    }
}

impl Error for SchemaError {}

/// Nesting spec resolution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    UnknownEntityKind(String),
    /// Dotted path of the first node that names no relation of its parent.
    InvalidNestingPath { path: String },
}

impl Display for PlanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntityKind(kind) => write!(f, "unknown entity kind: {kind}"),
            Self::InvalidNestingPath { path } => write!(f, "invalid nesting path: {path}"),
        }
    }
}

impl Error for PlanError {}
