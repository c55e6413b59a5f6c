//! SQLite storage bootstrap, migrations and entity table installation.
//!
//! # Responsibility
//! - Open and configure SQLite connections.
//! - Apply catalog migrations in deterministic order.
//! - Create one table per entity kind from a relation graph.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Foreign keys are enforced (`PRAGMA foreign_keys = ON`) on every
//!   connection returned by this module.
//! - Record reads/writes happen only after `install_schema` succeeds.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod install;
pub mod migrations;
mod open;

pub(crate) use install::{quote_ident, table_exists};
pub use install::{install_schema, table_ddl, InstallMode};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Installed table for `kind` was created from a different graph.
    SchemaMismatch {
        kind: String,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::SchemaMismatch { kind } => write!(
                f,
                "installed table for `{kind}` does not match the relation graph"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::SchemaMismatch { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
