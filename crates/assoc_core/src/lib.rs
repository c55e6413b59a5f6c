//! Relational association core.
//!
//! Entity kinds and one-to-many relations are declared once at startup,
//! installed as SQLite tables, then read back as nested trees (eager
//! fetch) and written through a creation gate that owns foreign-key
//! injection.

pub mod auth;
pub mod blog;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod service;
pub mod store;

pub use auth::{AuthError, Credentials, IdentityProvider};
pub use config::{ConfigError, CoreConfig, DbLocation};
pub use db::{install_schema, open_db, open_db_in_memory, DbError, DbResult, InstallMode};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::filter::RecordFilter;
pub use model::nesting::NestingSpec;
pub use model::record::{Attributes, NestedRecord, Record, RecordId};
pub use model::schema::{AttributeError, AttributeSpec, AttributeType, EntitySchema};
pub use registry::entity_registry::EntityRegistry;
pub use registry::relation_graph::{
    Cardinality, FetchPlan, Relation, RelationGraph, RelationGraphBuilder,
};
pub use registry::{PlanError, SchemaError, SchemaResult};
pub use service::creation_service::{CreateError, CreateResult, CreationGate, ForeignKeys};
pub use service::fetch_service::{EagerFetcher, FetchError, FetchResult};
pub use store::sqlite_store::SqliteRecordStore;
pub use store::{RecordStore, StoreError, StoreResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
