//! Entity attribute schema.
//!
//! # Responsibility
//! - Describe the attribute shape of one entity kind.
//! - Validate caller-provided attribute payloads against that shape.
//!
//! # Invariants
//! - Kind names are lowercase identifiers (`^[a-z][a-z0-9_]*$`) and never
//!   name a catalog or SQLite-internal table.
//! - Attribute names are identifiers and never shadow reserved columns.
//! - Foreign keys are not part of an `EntitySchema`; they are bound by the
//!   relation graph.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::model::record::Attributes;

static KIND_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid kind name regex"));
static ATTRIBUTE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid attribute name regex"));

/// Column names owned by the store for every entity table.
pub const RESERVED_ATTRIBUTE_NAMES: &[&str] = &[
    "id",
    "seq",
    "createdAt",
    "updatedAt",
    "created_at",
    "updated_at",
];

/// Table names owned by the catalog; `sqlite_` prefixed names are reserved too.
pub const RESERVED_KIND_NAMES: &[&str] = &["entity_catalog"];

/// Value type of one declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    Text,
    Integer,
    Real,
    /// Persisted as `0`/`1`.
    Boolean,
}

impl AttributeType {
    /// SQLite column affinity used for this type.
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Real => "REAL",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
        }
    }

    /// Returns whether a non-null JSON value fits this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_string(),
            Self::Integer => value.as_i64().is_some(),
            Self::Real => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

/// Declaration of one attribute column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    pub ty: AttributeType,
    /// Rejects absent or `null` values on create.
    pub required: bool,
    /// Backed by a `UNIQUE` constraint in storage.
    pub unique: bool,
}

impl AttributeSpec {
    /// Required, non-unique attribute.
    pub fn required(name: impl Into<String>, ty: AttributeType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            unique: false,
        }
    }

    /// Nullable, non-unique attribute.
    pub fn optional(name: impl Into<String>, ty: AttributeType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            unique: false,
        }
    }

    /// Marks this attribute as unique across all records of its kind.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Attribute shape of one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    kind: String,
    attributes: Vec<AttributeSpec>,
}

impl EntitySchema {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Vec::new(),
        }
    }

    /// Appends one attribute declaration. Name rules are checked at
    /// registration time.
    pub fn attribute(mut self, spec: AttributeSpec) -> Self {
        self.attributes.push(spec);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn attribute_spec(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|spec| spec.name == name)
    }

    /// Checks a create payload against declared attributes.
    ///
    /// Unknown keys, missing required values and type mismatches are
    /// rejected. Foreign keys must be removed by the caller beforehand.
    pub fn validate_attributes(&self, attributes: &Attributes) -> Result<(), AttributeError> {
        for name in attributes.keys() {
            if self.attribute_spec(name).is_none() {
                return Err(AttributeError::UnknownAttribute {
                    kind: self.kind.clone(),
                    attribute: name.clone(),
                });
            }
        }

        for spec in &self.attributes {
            match attributes.get(&spec.name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        return Err(AttributeError::MissingAttribute {
                            kind: self.kind.clone(),
                            attribute: spec.name.clone(),
                        });
                    }
                }
                Some(value) => {
                    if !spec.ty.accepts(value) {
                        return Err(AttributeError::TypeMismatch {
                            kind: self.kind.clone(),
                            attribute: spec.name.clone(),
                            expected: spec.ty,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

/// Create-payload validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    UnknownAttribute {
        kind: String,
        attribute: String,
    },
    MissingAttribute {
        kind: String,
        attribute: String,
    },
    TypeMismatch {
        kind: String,
        attribute: String,
        expected: AttributeType,
    },
}

impl Display for AttributeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAttribute { kind, attribute } => {
                write!(f, "unknown attribute `{attribute}` for `{kind}`")
            }
            Self::MissingAttribute { kind, attribute } => {
                write!(f, "missing required attribute `{attribute}` for `{kind}`")
            }
            Self::TypeMismatch {
                kind,
                attribute,
                expected,
            } => write!(
                f,
                "attribute `{attribute}` for `{kind}` must be {}",
                expected.as_str()
            ),
        }
    }
}

impl Error for AttributeError {}

/// Returns whether `name` is a valid entity kind name.
pub fn is_valid_kind_name(name: &str) -> bool {
    KIND_NAME_RE.is_match(name)
        && !name.starts_with("sqlite_")
        && !RESERVED_KIND_NAMES.contains(&name)
}

/// Returns whether `name` is a valid attribute, foreign key or alias name.
pub fn is_valid_attribute_name(name: &str) -> bool {
    ATTRIBUTE_NAME_RE.is_match(name)
}

/// Returns whether `name` collides with a store-owned column.
pub fn is_reserved_attribute_name(name: &str) -> bool {
    RESERVED_ATTRIBUTE_NAMES.contains(&name)
}
