//! Persisted record and nested retrieval result shapes.
//!
//! # Invariants
//! - `id` is assigned by the store and never changes.
//! - Foreign keys live in `attributes` as UUID strings.
//! - A `NestedRecord` carries one relation field per nesting node, in the
//!   order the nesting spec listed them, even when empty.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Stable identifier of one persisted record.
pub type RecordId = Uuid;

/// Attribute payload keyed by attribute or foreign-key name.
pub type Attributes = Map<String, Value>;

/// One persisted record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    /// Entity kind this record belongs to. Not serialized.
    #[serde(skip)]
    pub kind: String,
    /// Declared attributes and foreign keys. Optional attributes without a
    /// value are present as `null`.
    #[serde(flatten)]
    pub attributes: Attributes,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl Record {
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Returns the referenced id stored under `foreign_key`, if set and
    /// well-formed.
    pub fn foreign_key(&self, foreign_key: &str) -> Option<RecordId> {
        self.attributes
            .get(foreign_key)
            .and_then(Value::as_str)
            .and_then(|value| Uuid::parse_str(value).ok())
    }
}

/// Record with eagerly loaded related records attached.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedRecord {
    pub record: Record,
    /// `(alias, children)` per nesting node.
    pub relations: Vec<(String, Vec<NestedRecord>)>,
}

impl NestedRecord {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            relations: Vec::new(),
        }
    }

    /// Children loaded under `alias`, or `None` when that relation was not
    /// requested.
    pub fn relation(&self, alias: &str) -> Option<&[NestedRecord]> {
        self.relations
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, children)| children.as_slice())
    }

    /// Converts the tree into its JSON representation.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for NestedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let record = &self.record;
        let mut map =
            serializer.serialize_map(Some(record.attributes.len() + self.relations.len() + 3))?;
        map.serialize_entry("id", &record.id)?;
        for (name, value) in &record.attributes {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry("createdAt", &record.created_at)?;
        map.serialize_entry("updatedAt", &record.updated_at)?;
        for (alias, children) in &self.relations {
            map.serialize_entry(alias, children)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(kind: &str, attributes: Value) -> Record {
        Record {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            attributes: attributes.as_object().cloned().unwrap(),
            created_at: 1_000,
            updated_at: 2_000,
        }
    }

    #[test]
    fn foreign_key_parses_uuid_strings_only() {
        let author_id = Uuid::new_v4();
        let doc = record(
            "document",
            json!({"authorId": author_id.to_string(), "title": "t", "broken": "nope"}),
        );
        assert_eq!(doc.foreign_key("authorId"), Some(author_id));
        assert_eq!(doc.foreign_key("broken"), None);
        assert_eq!(doc.foreign_key("title"), None);
    }

    #[test]
    fn nested_record_serializes_flat_with_relation_arrays() {
        let mut nested = NestedRecord::new(record("author", json!({"displayName": "ada"})));
        nested.relations.push(("documents".to_string(), Vec::new()));

        let value = nested.to_json();
        assert_eq!(value["displayName"], "ada");
        assert_eq!(value["createdAt"], 1_000);
        assert_eq!(value["documents"], json!([]));
        assert!(value.get("kind").is_none());
    }
}
