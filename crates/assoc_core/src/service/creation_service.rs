//! Record creation use-case service.
//!
//! # Responsibility
//! - Validate create payloads against the entity schema.
//! - Inject the identity foreign key from the acting author.
//! - Require every other foreign key explicitly.
//!
//! # Invariants
//! - Creation requires a graph with an identity kind.
//! - The identity foreign key always equals the acting author id; caller
//!   supplied values are overridden, not rejected.
//! - Foreign keys are only taken from the explicit map.
//! - One create is one INSERT: it fully succeeds or persists nothing.

use crate::auth::{AuthError, Credentials, IdentityProvider};
use crate::model::record::{Attributes, Record, RecordId};
use crate::model::schema::AttributeError;
use crate::registry::relation_graph::RelationGraph;
use crate::store::{RecordStore, StoreError};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Explicit foreign-key values keyed by foreign-key name.
pub type ForeignKeys = BTreeMap<String, RecordId>;

pub type CreateResult<T> = Result<T, CreateError>;

#[derive(Debug)]
pub enum CreateError {
    Unauthenticated(AuthError),
    UnknownEntityKind(String),
    /// Identity records are created through `register_identity`.
    IdentityKind(String),
    /// The graph declares no identity kind.
    NoIdentityKind,
    InvalidAttributes(AttributeError),
    MissingForeignKey {
        kind: String,
        foreign_key: String,
    },
    UnknownForeignKey {
        kind: String,
        foreign_key: String,
    },
    DanglingForeignKey {
        kind: String,
        foreign_key: String,
        value: String,
    },
    UniqueViolation {
        kind: String,
        attribute: String,
    },
    Store(StoreError),
}

impl CreateError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::UnknownEntityKind(_) => "unknown_entity_kind",
            Self::IdentityKind(_) => "identity_kind",
            Self::NoIdentityKind => "no_identity_kind",
            Self::InvalidAttributes(_) => "invalid_attributes",
            Self::MissingForeignKey { .. } => "missing_foreign_key",
            Self::UnknownForeignKey { .. } => "unknown_foreign_key",
            Self::DanglingForeignKey { .. } => "dangling_foreign_key",
            Self::UniqueViolation { .. } => "unique_violation",
            Self::Store(_) => "store_error",
        }
    }
}

impl Display for CreateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated(err) => write!(f, "unauthenticated: {err}"),
            Self::UnknownEntityKind(kind) => write!(f, "unknown entity kind: {kind}"),
            Self::IdentityKind(kind) => {
                write!(f, "`{kind}` records are created by registration")
            }
            Self::NoIdentityKind => write!(f, "relation graph has no identity kind"),
            Self::InvalidAttributes(err) => write!(f, "{err}"),
            Self::MissingForeignKey { kind, foreign_key } => {
                write!(f, "missing foreign key `{foreign_key}` for `{kind}`")
            }
            Self::UnknownForeignKey { kind, foreign_key } => {
                write!(f, "`{kind}` has no foreign key `{foreign_key}`")
            }
            Self::DanglingForeignKey {
                kind,
                foreign_key,
                value,
            } => write!(
                f,
                "foreign key `{foreign_key}` on `{kind}` references missing record {value}"
            ),
            Self::UniqueViolation { kind, attribute } => {
                write!(f, "value for `{attribute}` on `{kind}` is already in use")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CreateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unauthenticated(err) => Some(err),
            Self::InvalidAttributes(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AuthError> for CreateError {
    fn from(value: AuthError) -> Self {
        Self::Unauthenticated(value)
    }
}

impl From<AttributeError> for CreateError {
    fn from(value: AttributeError) -> Self {
        Self::InvalidAttributes(value)
    }
}

impl From<StoreError> for CreateError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DanglingForeignKey {
                kind,
                foreign_key,
                value,
            } => Self::DanglingForeignKey {
                kind,
                foreign_key,
                value,
            },
            StoreError::UniqueViolation { kind, attribute } => {
                Self::UniqueViolation { kind, attribute }
            }
            StoreError::UnknownEntityKind(kind) => Self::UnknownEntityKind(kind),
            other => Self::Store(other),
        }
    }
}

/// Write-side gate in front of a record store.
pub struct CreationGate<'g, S: RecordStore> {
    graph: &'g RelationGraph,
    store: S,
}

impl<'g, S: RecordStore> CreationGate<'g, S> {
    pub fn new(graph: &'g RelationGraph, store: S) -> Self {
        Self { graph, store }
    }

    /// Persists one `kind` record on behalf of `acting_author_id`.
    ///
    /// # Errors
    /// - `NoIdentityKind` when the graph has no identity kind.
    /// - `IdentityKind` for the identity kind itself.
    /// - `InvalidAttributes` when `attributes` break the schema.
    /// - `UnknownForeignKey` / `MissingForeignKey` for explicit keys.
    /// - `DanglingForeignKey` when a key references no record.
    pub fn create(
        &self,
        kind: &str,
        attributes: Attributes,
        acting_author_id: RecordId,
        explicit_foreign_keys: &ForeignKeys,
    ) -> CreateResult<Record> {
        let started_at = Instant::now();
        let result = self.create_inner(kind, attributes, acting_author_id, explicit_foreign_keys);
        log_outcome("record_create", kind, started_at, &result);
        result
    }

    /// Authenticates `credentials` first, then behaves like
    /// [`CreationGate::create`].
    pub fn create_authenticated<P: IdentityProvider + ?Sized>(
        &self,
        provider: &P,
        credentials: &Credentials,
        kind: &str,
        attributes: Attributes,
        explicit_foreign_keys: &ForeignKeys,
    ) -> CreateResult<Record> {
        let acting_author_id = match provider.authenticate(credentials) {
            Ok(id) => id,
            Err(err) => {
                warn!(
                    "event=record_create module=gate status=error kind={} error_code=unauthenticated",
                    kind
                );
                return Err(err.into());
            }
        };
        self.create(kind, attributes, acting_author_id, explicit_foreign_keys)
    }

    /// Creates one identity-kind record (sign-up).
    pub fn register_identity(&self, attributes: Attributes) -> CreateResult<Record> {
        let started_at = Instant::now();
        let kind = self
            .graph
            .identity_kind()
            .ok_or(CreateError::NoIdentityKind)?;
        let result = self.register_inner(kind, attributes);
        log_outcome("identity_register", kind, started_at, &result);
        result
    }

    fn create_inner(
        &self,
        kind: &str,
        mut attributes: Attributes,
        acting_author_id: RecordId,
        explicit_foreign_keys: &ForeignKeys,
    ) -> CreateResult<Record> {
        let schema = self
            .graph
            .schema(kind)
            .ok_or_else(|| CreateError::UnknownEntityKind(kind.to_string()))?;
        let identity_kind = self
            .graph
            .identity_kind()
            .ok_or(CreateError::NoIdentityKind)?;
        if identity_kind == kind {
            return Err(CreateError::IdentityKind(kind.to_string()));
        }

        for foreign_key in self.graph.foreign_keys_of(kind) {
            if attributes.remove(foreign_key).is_some() {
                debug!(
                    "event=record_create module=gate status=discard kind={} foreign_key={} source=attributes",
                    kind, foreign_key
                );
            }
        }
        schema.validate_attributes(&attributes)?;

        for foreign_key in explicit_foreign_keys.keys() {
            if self.graph.foreign_key_relation(kind, foreign_key).is_none() {
                return Err(CreateError::UnknownForeignKey {
                    kind: kind.to_string(),
                    foreign_key: foreign_key.clone(),
                });
            }
        }

        for relation in self.graph.relations_into(kind) {
            let supplied = explicit_foreign_keys.get(&relation.foreign_key).copied();
            let value = if relation.source == identity_kind {
                if supplied.is_some_and(|id| id != acting_author_id) {
                    debug!(
                        "event=record_create module=gate status=override kind={} foreign_key={}",
                        kind, relation.foreign_key
                    );
                }
                acting_author_id
            } else {
                supplied.ok_or_else(|| CreateError::MissingForeignKey {
                    kind: kind.to_string(),
                    foreign_key: relation.foreign_key.clone(),
                })?
            };
            attributes.insert(
                relation.foreign_key.clone(),
                Value::String(value.to_string()),
            );
        }

        Ok(self.store.insert(kind, &attributes)?)
    }

    fn register_inner(&self, kind: &str, attributes: Attributes) -> CreateResult<Record> {
        let schema = self
            .graph
            .schema(kind)
            .ok_or_else(|| CreateError::UnknownEntityKind(kind.to_string()))?;
        if let Some(relation) = self.graph.relations_into(kind).next() {
            return Err(CreateError::MissingForeignKey {
                kind: kind.to_string(),
                foreign_key: relation.foreign_key.clone(),
            });
        }
        schema.validate_attributes(&attributes)?;
        Ok(self.store.insert(kind, &attributes)?)
    }
}

fn log_outcome(event: &str, kind: &str, started_at: Instant, result: &CreateResult<Record>) {
    match result {
        Ok(record) => info!(
            "event={} module=gate status=ok kind={} id={} duration_ms={}",
            event,
            kind,
            record.id,
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event={} module=gate status=error kind={} duration_ms={} error_code={} error={}",
            event,
            kind,
            started_at.elapsed().as_millis(),
            err.code(),
            err
        ),
    }
}
