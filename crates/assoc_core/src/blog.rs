//! Sample blog schema: authors own documents, documents collect
//! annotations, and every annotation also belongs to its author.

use crate::model::schema::{AttributeSpec, AttributeType, EntitySchema};
use crate::registry::entity_registry::EntityRegistry;
use crate::registry::relation_graph::{Cardinality, RelationGraph, RelationGraphBuilder};
use crate::registry::SchemaResult;

pub const AUTHOR: &str = "author";
pub const DOCUMENT: &str = "document";
pub const ANNOTATION: &str = "annotation";

/// Registers the author, document and annotation kinds.
pub fn blog_registry() -> SchemaResult<EntityRegistry> {
    let mut registry = EntityRegistry::new();
    registry.register(
        EntitySchema::new(AUTHOR)
            .attribute(AttributeSpec::required("displayName", AttributeType::Text).unique())
            .attribute(AttributeSpec::required("credentialHash", AttributeType::Text)),
    )?;
    registry.register(
        EntitySchema::new(DOCUMENT)
            .attribute(AttributeSpec::required("title", AttributeType::Text))
            .attribute(AttributeSpec::required("body", AttributeType::Text)),
    )?;
    registry.register(
        EntitySchema::new(ANNOTATION)
            .attribute(AttributeSpec::required("body", AttributeType::Text)),
    )?;
    Ok(registry)
}

/// Builds the blog relation graph with `author` as identity kind.
pub fn blog_graph() -> SchemaResult<RelationGraph> {
    let mut builder = RelationGraphBuilder::new(blog_registry()?);
    builder.declare_relation(AUTHOR, DOCUMENT, Cardinality::OneToMany)?;
    builder.declare_relation(AUTHOR, ANNOTATION, Cardinality::OneToMany)?;
    builder.declare_relation(DOCUMENT, ANNOTATION, Cardinality::OneToMany)?;
    builder.identity_kind(AUTHOR)?;
    Ok(builder.build())
}
