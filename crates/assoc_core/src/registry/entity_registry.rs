//! Entity kind registration.

use crate::model::schema::{
    is_reserved_attribute_name, is_valid_attribute_name, is_valid_kind_name, EntitySchema,
};
use crate::registry::{SchemaError, SchemaResult};
use std::collections::{BTreeMap, HashSet};

/// Startup-time set of entity kinds, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    schemas: Vec<EntitySchema>,
    index: BTreeMap<String, usize>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one entity kind.
    ///
    /// # Errors
    /// - `DuplicateEntityKind` when the kind is already registered.
    /// - `InvalidName` / `ReservedAttribute` / `DuplicateAttribute` when the
    ///   schema breaks naming rules.
    pub fn register(&mut self, schema: EntitySchema) -> SchemaResult<()> {
        let kind = schema.kind().to_string();
        if !is_valid_kind_name(&kind) {
            return Err(SchemaError::InvalidName(kind));
        }
        if self.index.contains_key(&kind) {
            return Err(SchemaError::DuplicateEntityKind(kind));
        }

        let mut seen = HashSet::new();
        for spec in schema.attributes() {
            if !is_valid_attribute_name(&spec.name) {
                return Err(SchemaError::InvalidName(spec.name.clone()));
            }
            if is_reserved_attribute_name(&spec.name) {
                return Err(SchemaError::ReservedAttribute {
                    kind,
                    attribute: spec.name.clone(),
                });
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(SchemaError::DuplicateAttribute {
                    kind,
                    attribute: spec.name.clone(),
                });
            }
        }

        self.index.insert(kind, self.schemas.len());
        self.schemas.push(schema);
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Option<&EntitySchema> {
        self.index.get(kind).map(|position| &self.schemas[*position])
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.index.contains_key(kind)
    }

    /// Schemas in registration order.
    pub fn schemas(&self) -> &[EntitySchema] {
        &self.schemas
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
