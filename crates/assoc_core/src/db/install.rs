//! Entity table installation.
//!
//! # Responsibility
//! - Derive one `CREATE TABLE` statement per entity kind from the graph.
//! - Create missing tables in dependency order inside one transaction.
//! - Track installed DDL in `entity_catalog` and reject drift.
//!
//! # Invariants
//! - Every table has `seq` (insertion order), `id` (unique UUID text),
//!   declared attribute columns, foreign-key columns, `created_at` and
//!   `updated_at`.
//! - Foreign-key columns are `NOT NULL` and reference `"<source>"(id)`.
//! - Installation either fully succeeds or leaves the database unchanged.
//! - `created_at`/`updated_at` default to Unix epoch milliseconds.

use crate::db::{DbError, DbResult};
use crate::model::schema::EntitySchema;
use crate::registry::relation_graph::RelationGraph;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::time::Instant;

/// Unix epoch milliseconds; `strftime('%s')` would truncate to seconds.
const TIMESTAMP_DEFAULT: &str = "(CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER))";

/// How `install_schema` treats tables that already exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstallMode {
    /// Create missing tables; keep existing rows.
    #[default]
    Create,
    /// Drop every graph table (children first) and recreate it empty.
    ForceReset,
}

/// Installs entity tables for every kind in `graph`.
///
/// Re-installing the same graph is a no-op. A kind whose recorded DDL
/// differs from the current graph fails with `SchemaMismatch` unless
/// `InstallMode::ForceReset` is used.
pub fn install_schema(
    conn: &mut Connection,
    graph: &RelationGraph,
    mode: InstallMode,
) -> DbResult<()> {
    let started_at = Instant::now();
    let tx = conn.transaction()?;
    match install_in_tx(&tx, graph, mode) {
        Ok(created) => {
            tx.commit()?;
            info!(
                "event=schema_install module=db status=ok mode={:?} kinds={} created={} duration_ms={}",
                mode,
                graph.schemas().len(),
                created,
                started_at.elapsed().as_millis()
            );
            Ok(())
        }
        Err(err) => {
            error!(
                "event=schema_install module=db status=error mode={:?} duration_ms={} error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Returns the `CREATE TABLE` statement for `kind`, or `None` when the kind
/// is not part of `graph`.
pub fn table_ddl(graph: &RelationGraph, kind: &str) -> Option<String> {
    graph.schema(kind).map(|schema| schema_ddl(graph, schema))
}

fn install_in_tx(tx: &Transaction<'_>, graph: &RelationGraph, mode: InstallMode) -> DbResult<usize> {
    let kinds = graph.kinds_in_dependency_order();

    if mode == InstallMode::ForceReset {
        // Existing tables may reference each other in an order the new graph
        // no longer matches; checks run at commit, once every table is gone.
        tx.execute_batch("PRAGMA defer_foreign_keys = ON;")?;
        for kind in kinds.iter().rev() {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(kind)))?;
            tx.execute("DELETE FROM entity_catalog WHERE kind = ?1;", [kind])?;
        }
    }

    let mut created = 0;
    for kind in kinds {
        let Some(ddl) = table_ddl(graph, kind) else {
            continue;
        };

        let installed: Option<String> = tx
            .query_row(
                "SELECT ddl FROM entity_catalog WHERE kind = ?1;",
                [kind],
                |row| row.get(0),
            )
            .optional()?;

        match installed {
            Some(existing) if existing == ddl => {}
            Some(_) => {
                return Err(DbError::SchemaMismatch {
                    kind: kind.to_string(),
                })
            }
            None => {
                if table_exists(tx, kind)? {
                    return Err(DbError::SchemaMismatch {
                        kind: kind.to_string(),
                    });
                }
                tx.execute_batch(&ddl)?;
                tx.execute(
                    "INSERT INTO entity_catalog (kind, ddl) VALUES (?1, ?2);",
                    params![kind, ddl],
                )?;
                created += 1;
            }
        }

        for foreign_key in graph.foreign_keys_of(kind) {
            tx.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({});",
                quote_ident(&format!("idx_{kind}_{foreign_key}")),
                quote_ident(kind),
                quote_ident(foreign_key)
            ))?;
        }
    }

    Ok(created)
}

fn schema_ddl(graph: &RelationGraph, schema: &EntitySchema) -> String {
    let kind = schema.kind();
    let mut columns = vec![
        "seq INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
        "id TEXT NOT NULL UNIQUE".to_string(),
    ];

    for spec in schema.attributes() {
        let mut column = format!("{} {}", quote_ident(&spec.name), spec.ty.sql_type());
        if spec.required {
            column.push_str(" NOT NULL");
        }
        if spec.unique {
            column.push_str(" UNIQUE");
        }
        columns.push(column);
    }

    for relation in graph.relations_into(kind) {
        columns.push(format!(
            "{} TEXT NOT NULL REFERENCES {} (id)",
            quote_ident(&relation.foreign_key),
            quote_ident(&relation.source)
        ));
    }

    columns.push(format!("created_at INTEGER NOT NULL DEFAULT {TIMESTAMP_DEFAULT}"));
    columns.push(format!("updated_at INTEGER NOT NULL DEFAULT {TIMESTAMP_DEFAULT}"));

    format!(
        "CREATE TABLE {} (\n    {}\n);",
        quote_ident(kind),
        columns.join(",\n    ")
    )
}

/// Quotes an already-validated identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
