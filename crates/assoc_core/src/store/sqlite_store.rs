//! SQLite-backed record store.
//!
//! # Responsibility
//! - Persist and query records in the tables created by `install_schema`.
//! - Convert between JSON attribute values and SQLite values.
//! - Surface foreign-key and unique constraint failures as semantic errors.
//!
//! # Invariants
//! - SQL identifiers come only from the validated relation graph.
//! - Read paths reject malformed persisted values instead of masking them.
//! - Values are type-checked before the INSERT; a written row always reads
//!   back.
//! - Query results are ordered by `seq ASC` (insertion order).

use crate::db::{quote_ident, table_exists};
use crate::model::filter::RecordFilter;
use crate::model::record::{Attributes, Record, RecordId};
use crate::model::schema::AttributeType;
use crate::registry::relation_graph::RelationGraph;
use crate::store::{RecordStore, StoreError, StoreResult};
use log::debug;
use rusqlite::types::Value as SqlValue;
use rusqlite::{ffi, params_from_iter, Connection, Row};
use serde_json::{Number, Value};
use uuid::Uuid;

/// Storage column of one entity table, besides `id` and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Column {
    name: String,
    ty: ColumnType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Attribute(AttributeType),
    ForeignKey,
}

/// Record store over a migrated connection with installed entity tables.
pub struct SqliteRecordStore<'a> {
    conn: &'a Connection,
    graph: &'a RelationGraph,
}

impl<'a> SqliteRecordStore<'a> {
    /// Creates a store after checking every graph kind has its table.
    pub fn try_new(conn: &'a Connection, graph: &'a RelationGraph) -> StoreResult<Self> {
        for schema in graph.schemas() {
            if !table_exists(conn, schema.kind())? {
                return Err(StoreError::MissingTable(schema.kind().to_string()));
            }
        }
        Ok(Self { conn, graph })
    }

    pub fn graph(&self) -> &RelationGraph {
        self.graph
    }

    fn columns(&self, kind: &str) -> StoreResult<Vec<Column>> {
        let schema = self
            .graph
            .schema(kind)
            .ok_or_else(|| StoreError::UnknownEntityKind(kind.to_string()))?;

        let mut columns: Vec<Column> = schema
            .attributes()
            .iter()
            .map(|spec| Column {
                name: spec.name.clone(),
                ty: ColumnType::Attribute(spec.ty),
            })
            .collect();
        columns.extend(self.graph.foreign_keys_of(kind).into_iter().map(|name| Column {
            name: name.to_string(),
            ty: ColumnType::ForeignKey,
        }));
        Ok(columns)
    }

    fn classify_insert_error(
        &self,
        kind: &str,
        attributes: &Attributes,
        err: rusqlite::Error,
    ) -> StoreError {
        if let rusqlite::Error::SqliteFailure(failure, message) = &err {
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => match self.find_dangling(kind, attributes) {
                    Ok(Some(dangling)) => return dangling,
                    Ok(None) => {}
                    Err(lookup_err) => return lookup_err,
                },
                ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    return StoreError::UniqueViolation {
                        kind: kind.to_string(),
                        attribute: unique_column(message.as_deref()),
                    };
                }
                _ => {}
            }
        }
        err.into()
    }

    /// SQLite does not report which foreign key failed; check each one.
    fn find_dangling(&self, kind: &str, attributes: &Attributes) -> StoreResult<Option<StoreError>> {
        for relation in self.graph.relations_into(kind) {
            let Some(value) = attributes.get(&relation.foreign_key) else {
                continue;
            };
            let present = match value.as_str().and_then(|text| Uuid::parse_str(text).ok()) {
                Some(id) => self.exists(&relation.source, id)?,
                None => false,
            };
            if !present {
                return Ok(Some(StoreError::DanglingForeignKey {
                    kind: kind.to_string(),
                    foreign_key: relation.foreign_key.clone(),
                    value: value.as_str().map_or_else(|| value.to_string(), str::to_string),
                }));
            }
        }
        Ok(None)
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn insert(&self, kind: &str, attributes: &Attributes) -> StoreResult<Record> {
        let columns = self.columns(kind)?;
        for name in attributes.keys() {
            if !columns.iter().any(|column| column.name == *name) {
                return Err(StoreError::UnknownAttribute {
                    kind: kind.to_string(),
                    attribute: name.clone(),
                });
            }
        }

        let id = Uuid::new_v4();
        let mut names = vec!["id".to_string()];
        let mut values = vec![SqlValue::Text(id.to_string())];
        for column in &columns {
            if let Some(value) = attributes.get(&column.name) {
                check_column_value(kind, column, value)?;
                names.push(quote_ident(&column.name));
                values.push(json_to_sql(kind, &column.name, value)?);
            }
        }

        let placeholders = (1..=values.len())
            .map(|position| format!("?{position}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            quote_ident(kind),
            names.join(", "),
            placeholders
        );

        if let Err(err) = self.conn.execute(&sql, params_from_iter(values)) {
            let classified = self.classify_insert_error(kind, attributes, err);
            debug!(
                "event=record_insert module=store status=error kind={} error={}",
                kind, classified
            );
            return Err(classified);
        }

        debug!(
            "event=record_insert module=store status=ok kind={} id={}",
            kind, id
        );
        self.get(kind, id)?.ok_or_else(|| {
            StoreError::InvalidData(format!("inserted `{kind}` record {id} missing on read-back"))
        })
    }

    fn query(&self, kind: &str, filter: &RecordFilter) -> StoreResult<Vec<Record>> {
        let columns = self.columns(kind)?;

        let mut select = vec!["id".to_string()];
        select.extend(columns.iter().map(|column| quote_ident(&column.name)));
        select.push("created_at".to_string());
        select.push("updated_at".to_string());

        let mut sql = format!(
            "SELECT {} FROM {} WHERE 1 = 1",
            select.join(", "),
            quote_ident(kind)
        );
        let mut bind_values: Vec<SqlValue> = Vec::new();

        for condition in filter.conditions() {
            let column = if condition.attribute == "id" {
                "id".to_string()
            } else if columns.iter().any(|column| column.name == condition.attribute) {
                quote_ident(&condition.attribute)
            } else {
                return Err(StoreError::UnknownAttribute {
                    kind: kind.to_string(),
                    attribute: condition.attribute.clone(),
                });
            };

            match condition.values.len() {
                0 => sql.push_str(" AND 0 = 1"),
                1 => sql.push_str(&format!(" AND {column} = ?")),
                count => sql.push_str(&format!(
                    " AND {column} IN ({})",
                    vec!["?"; count].join(", ")
                )),
            }
            for value in &condition.values {
                bind_values.push(json_to_sql(kind, &condition.attribute, value)?);
            }
        }

        sql.push_str(" ORDER BY seq ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(kind, &columns, row)?);
        }
        Ok(records)
    }

    fn exists(&self, kind: &str, id: RecordId) -> StoreResult<bool> {
        if !self.graph.contains(kind) {
            return Err(StoreError::UnknownEntityKind(kind.to_string()));
        }
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);",
                quote_ident(kind)
            ),
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn parse_record_row(kind: &str, columns: &[Column], row: &Row<'_>) -> StoreResult<Record> {
    let id_text: String = row.get(0)?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid value `{id_text}` in {kind}.id"))
    })?;

    let mut attributes = Attributes::new();
    for (offset, column) in columns.iter().enumerate() {
        let index = offset + 1;
        let value = match column.ty {
            ColumnType::ForeignKey | ColumnType::Attribute(AttributeType::Text) => row
                .get::<_, Option<String>>(index)?
                .map_or(Value::Null, Value::String),
            ColumnType::Attribute(AttributeType::Integer) => row
                .get::<_, Option<i64>>(index)?
                .map_or(Value::Null, Value::from),
            ColumnType::Attribute(AttributeType::Real) => match row.get::<_, Option<f64>>(index)? {
                Some(number) => Number::from_f64(number).map(Value::Number).ok_or_else(|| {
                    StoreError::InvalidData(format!(
                        "non-finite value in {kind}.{}",
                        column.name
                    ))
                })?,
                None => Value::Null,
            },
            ColumnType::Attribute(AttributeType::Boolean) => {
                match row.get::<_, Option<i64>>(index)? {
                    Some(0) => Value::Bool(false),
                    Some(1) => Value::Bool(true),
                    Some(other) => {
                        return Err(StoreError::InvalidData(format!(
                            "invalid boolean value `{other}` in {kind}.{}",
                            column.name
                        )));
                    }
                    None => Value::Null,
                }
            }
        };
        attributes.insert(column.name.clone(), value);
    }

    Ok(Record {
        id,
        kind: kind.to_string(),
        attributes,
        created_at: row.get(columns.len() + 1)?,
        updated_at: row.get(columns.len() + 2)?,
    })
}

/// Rejects values the row parser could not read back.
fn check_column_value(kind: &str, column: &Column, value: &Value) -> StoreResult<()> {
    if value.is_null() {
        return Ok(());
    }
    let expected = match column.ty {
        ColumnType::Attribute(ty) if ty.accepts(value) => return Ok(()),
        ColumnType::Attribute(ty) => ty.as_str(),
        ColumnType::ForeignKey if value.as_str().is_some() => return Ok(()),
        ColumnType::ForeignKey => "text",
    };
    Err(StoreError::InvalidData(format!(
        "`{}` on `{kind}` must be {expected}",
        column.name
    )))
}

fn json_to_sql(kind: &str, attribute: &str, value: &Value) -> StoreResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => Ok(SqlValue::Integer(integer)),
            None => number.as_f64().map(SqlValue::Real).ok_or_else(|| {
                StoreError::InvalidData(format!("`{attribute}` on `{kind}` is out of range"))
            }),
        },
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        Value::Array(_) | Value::Object(_) => Err(StoreError::InvalidData(format!(
            "`{attribute}` on `{kind}` must be a scalar value"
        ))),
    }
}

/// Extracts `column` from `UNIQUE constraint failed: table.column`.
fn unique_column(message: Option<&str>) -> String {
    message
        .and_then(|text| text.rsplit('.').next())
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}
