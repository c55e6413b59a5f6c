//! Domain model for entity schemas, records and retrieval requests.
//!
//! # Responsibility
//! - Define the attribute schema of entity kinds.
//! - Define persisted records and nested retrieval results.
//! - Define nesting specs and filters consumed by the eager fetcher.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - Nested results never omit a requested relation field.

pub mod filter;
pub mod nesting;
pub mod record;
pub mod schema;
