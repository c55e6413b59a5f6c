//! Record store contracts.
//!
//! # Responsibility
//! - Define the persistence interface used by the fetcher and the gate.
//! - Translate storage constraint failures into semantic errors.
//!
//! # Invariants
//! - `insert` is atomic: it either persists the whole record or nothing.
//! - `query` returns records in insertion order.
//! - Referential integrity is enforced by the store, never re-implemented
//!   by callers.

use crate::db::DbError;
use crate::model::filter::RecordFilter;
use crate::model::record::{Attributes, Record, RecordId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite_store;

pub type StoreResult<T> = Result<T, StoreError>;

/// Record store failure.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Foreign key value references no record of the related kind.
    DanglingForeignKey {
        kind: String,
        foreign_key: String,
        value: String,
    },
    /// Unique attribute value already taken.
    UniqueViolation {
        kind: String,
        attribute: String,
    },
    UnknownEntityKind(String),
    /// Attribute is neither `id`, declared, nor a foreign key of `kind`.
    UnknownAttribute {
        kind: String,
        attribute: String,
    },
    /// Entity table for `kind` has not been installed.
    MissingTable(String),
    /// Input or persisted value cannot be converted.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
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
            Self::UnknownEntityKind(kind) => write!(f, "unknown entity kind: {kind}"),
            Self::UnknownAttribute { kind, attribute } => {
                write!(f, "unknown attribute `{attribute}` for `{kind}`")
            }
            Self::MissingTable(kind) => write!(f, "entity table is not installed: {kind}"),
            Self::InvalidData(message) => write!(f, "invalid record data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable record persistence.
pub trait RecordStore {
    /// Persists one record of `kind` and returns it fully populated.
    fn insert(&self, kind: &str, attributes: &Attributes) -> StoreResult<Record>;
    /// Returns records of `kind` matching `filter`, in insertion order.
    fn query(&self, kind: &str, filter: &RecordFilter) -> StoreResult<Vec<Record>>;
    /// Returns whether a record of `kind` with `id` exists.
    fn exists(&self, kind: &str, id: RecordId) -> StoreResult<bool>;

    /// Loads one record by id.
    fn get(&self, kind: &str, id: RecordId) -> StoreResult<Option<Record>> {
        Ok(self
            .query(kind, &RecordFilter::by_id(id))?
            .into_iter()
            .next())
    }
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn insert(&self, kind: &str, attributes: &Attributes) -> StoreResult<Record> {
        (**self).insert(kind, attributes)
    }

    fn query(&self, kind: &str, filter: &RecordFilter) -> StoreResult<Vec<Record>> {
        (**self).query(kind, filter)
    }

    fn exists(&self, kind: &str, id: RecordId) -> StoreResult<bool> {
        (**self).exists(kind, id)
    }
}
