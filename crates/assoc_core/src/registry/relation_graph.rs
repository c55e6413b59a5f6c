//! Relation graph contracts and nesting resolution.
//!
//! # Responsibility
//! - Bind one-to-many relations between registered entity kinds.
//! - Derive foreign-key names (`<source>Id`) and relation aliases.
//! - Resolve nesting specs into fetch plans before any query runs.
//!
//! # Invariants
//! - Relations only connect registered kinds.
//! - At most one relation per `(source, target)` pair.
//! - The graph is acyclic; a rejected declaration leaves the builder
//!   unchanged.
//! - Attribute, foreign-key and alias names are unique per kind.

use crate::model::nesting::{join_path, NestingSpec};
use crate::model::schema::{is_reserved_attribute_name, is_valid_attribute_name, EntitySchema};
use crate::registry::entity_registry::EntityRegistry;
use crate::registry::{PlanError, SchemaError, SchemaResult};
use std::collections::{BTreeSet, HashSet};

/// Shape of a relation. Only one-to-many is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    OneToMany,
}

/// One declared relation. `source` owns many `target` records; the target
/// holds `foreign_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub source: String,
    pub target: String,
    pub cardinality: Cardinality,
    /// Column on `target` holding the source record id.
    pub foreign_key: String,
    /// Field name on nested `source` results.
    pub alias: String,
}

/// Naming convention for the foreign key bound by `source -> target`.
pub fn foreign_key_name(source: &str) -> String {
    format!("{source}Id")
}

/// Naming convention for the relation field exposed on `source`.
pub fn default_alias(target: &str) -> String {
    format!("{target}s")
}

/// Mutable startup-time builder. Consumed by [`RelationGraphBuilder::build`].
#[derive(Debug, Clone)]
pub struct RelationGraphBuilder {
    registry: EntityRegistry,
    relations: Vec<Relation>,
    identity_kind: Option<String>,
}

impl RelationGraphBuilder {
    pub fn new(registry: EntityRegistry) -> Self {
        Self {
            registry,
            relations: Vec::new(),
            identity_kind: None,
        }
    }

    /// Declares `source` one-to-many `target` with the conventional alias.
    pub fn declare_relation(
        &mut self,
        source: &str,
        target: &str,
        cardinality: Cardinality,
    ) -> SchemaResult<()> {
        self.declare_relation_as(source, target, cardinality, &default_alias(target))
    }

    /// Declares `source` one-to-many `target`, exposing it on `source` as `alias`.
    ///
    /// # Errors
    /// - `UnknownEntityKind` when either kind is not registered.
    /// - `DuplicateRelation` when the pair is already declared.
    /// - `CyclicRelation` when `target` already reaches `source`.
    /// - `InvalidName` / `NameConflict` when the derived names clash.
    pub fn declare_relation_as(
        &mut self,
        source: &str,
        target: &str,
        cardinality: Cardinality,
        alias: &str,
    ) -> SchemaResult<()> {
        for kind in [source, target] {
            if !self.registry.contains(kind) {
                return Err(SchemaError::UnknownEntityKind(kind.to_string()));
            }
        }

        if self
            .relations
            .iter()
            .any(|relation| relation.source == source && relation.target == target)
        {
            return Err(SchemaError::DuplicateRelation {
                source: source.to_string(),
                target: target.to_string(),
            });
        }

        if source == target || reaches(&self.relations, target, source) {
            return Err(SchemaError::CyclicRelation {
                source: source.to_string(),
                target: target.to_string(),
            });
        }

        if !is_valid_attribute_name(alias) || is_reserved_attribute_name(alias) {
            return Err(SchemaError::InvalidName(alias.to_string()));
        }

        let foreign_key = foreign_key_name(source);
        self.ensure_name_free(target, &foreign_key)?;
        self.ensure_name_free(source, alias)?;

        self.relations.push(Relation {
            source: source.to_string(),
            target: target.to_string(),
            cardinality,
            foreign_key,
            alias: alias.to_string(),
        });
        Ok(())
    }

    /// Marks `kind` as the kind whose ids identify authenticated actors.
    pub fn identity_kind(&mut self, kind: &str) -> SchemaResult<()> {
        if !self.registry.contains(kind) {
            return Err(SchemaError::UnknownEntityKind(kind.to_string()));
        }
        self.identity_kind = Some(kind.to_string());
        Ok(())
    }

    /// Number of relations declared so far.
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Freezes the graph.
    pub fn build(self) -> RelationGraph {
        RelationGraph {
            registry: self.registry,
            relations: self.relations,
            identity_kind: self.identity_kind,
        }
    }

    fn ensure_name_free(&self, kind: &str, name: &str) -> SchemaResult<()> {
        let taken = self
            .registry
            .get(kind)
            .is_some_and(|schema| schema.attribute_spec(name).is_some())
            || self.relations.iter().any(|relation| {
                (relation.target == kind && relation.foreign_key == name)
                    || (relation.source == kind && relation.alias == name)
            });
        if taken {
            return Err(SchemaError::NameConflict {
                kind: kind.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

fn reaches(relations: &[Relation], from: &str, to: &str) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![from];
    while let Some(kind) = stack.pop() {
        if kind == to {
            return true;
        }
        if !visited.insert(kind) {
            continue;
        }
        stack.extend(
            relations
                .iter()
                .filter(|relation| relation.source == kind)
                .map(|relation| relation.target.as_str()),
        );
    }
    false
}

/// Immutable, validated relation graph.
#[derive(Debug, Clone)]
pub struct RelationGraph {
    registry: EntityRegistry,
    relations: Vec<Relation>,
    identity_kind: Option<String>,
}

impl RelationGraph {
    pub fn schema(&self, kind: &str) -> Option<&EntitySchema> {
        self.registry.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.registry.contains(kind)
    }

    /// All schemas in registration order.
    pub fn schemas(&self) -> &[EntitySchema] {
        self.registry.schemas()
    }

    /// All relations in declaration order.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Relations where `kind` is the "one" side.
    pub fn relations_from<'a, 'k>(
        &'a self,
        kind: &'k str,
    ) -> impl Iterator<Item = &'a Relation> + 'k
    where
        'a: 'k,
    {
        self.relations
            .iter()
            .filter(move |relation| relation.source == kind)
    }

    /// Relations whose foreign key lives on `kind`.
    pub fn relations_into<'a, 'k>(
        &'a self,
        kind: &'k str,
    ) -> impl Iterator<Item = &'a Relation> + 'k
    where
        'a: 'k,
    {
        self.relations
            .iter()
            .filter(move |relation| relation.target == kind)
    }

    /// Foreign-key names held by `kind`, in declaration order.
    pub fn foreign_keys_of(&self, kind: &str) -> Vec<&str> {
        self.relations_into(kind)
            .map(|relation| relation.foreign_key.as_str())
            .collect()
    }

    /// The relation binding `foreign_key` onto `kind`.
    pub fn foreign_key_relation(&self, kind: &str, foreign_key: &str) -> Option<&Relation> {
        self.relations_into(kind)
            .find(|relation| relation.foreign_key == foreign_key)
    }

    pub fn identity_kind(&self) -> Option<&str> {
        self.identity_kind.as_deref()
    }

    /// The relation from the identity kind into `kind`, if any.
    pub fn identity_relation(&self, kind: &str) -> Option<&Relation> {
        let identity = self.identity_kind.as_deref()?;
        self.relations_into(kind)
            .find(|relation| relation.source == identity)
    }

    /// Kinds ordered so that every source precedes its targets. Ties keep
    /// registration order.
    pub fn kinds_in_dependency_order(&self) -> Vec<&str> {
        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut ordered = Vec::with_capacity(self.registry.len());
        while ordered.len() < self.registry.len() {
            let next = self.registry.schemas().iter().map(EntitySchema::kind).find(|kind| {
                !placed.contains(kind)
                    && self
                        .relations_into(kind)
                        .all(|relation| placed.contains(relation.source.as_str()))
            });
            match next {
                Some(kind) => {
                    placed.insert(kind);
                    ordered.push(kind);
                }
                // Unreachable for an acyclic graph.
                None => break,
            }
        }
        ordered
    }

    /// Resolves `spec` against relations reachable from `root`.
    ///
    /// Nodes may name a relation by alias or by target kind. A relation
    /// named twice under the same node is rejected.
    pub fn resolve_nesting(&self, root: &str, spec: &NestingSpec) -> Result<FetchPlan, PlanError> {
        if !self.contains(root) {
            return Err(PlanError::UnknownEntityKind(root.to_string()));
        }
        self.resolve_node(root, spec, "")
    }

    fn resolve_node(
        &self,
        kind: &str,
        spec: &NestingSpec,
        path: &str,
    ) -> Result<FetchPlan, PlanError> {
        let mut steps: Vec<FetchStep> = Vec::with_capacity(spec.includes().len());
        for (name, nested) in spec.includes() {
            let node_path = join_path(path, name);
            let relation = self
                .relations_from(kind)
                .find(|relation| relation.alias == *name)
                .or_else(|| {
                    self.relations_from(kind)
                        .find(|relation| relation.target == *name)
                })
                .ok_or_else(|| PlanError::InvalidNestingPath {
                    path: node_path.clone(),
                })?;

            if steps.iter().any(|step| step.relation == *relation) {
                return Err(PlanError::InvalidNestingPath { path: node_path });
            }

            let plan = self.resolve_node(&relation.target, nested, &node_path)?;
            steps.push(FetchStep {
                relation: relation.clone(),
                plan,
            });
        }

        Ok(FetchPlan {
            kind: kind.to_string(),
            steps,
        })
    }
}

/// Resolved traversal for one nesting node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub kind: String,
    pub steps: Vec<FetchStep>,
}

impl FetchPlan {
    pub fn depth(&self) -> usize {
        self.steps
            .iter()
            .map(|step| step.plan.depth() + 1)
            .max()
            .unwrap_or(0)
    }
}

/// One relation to load under a plan node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchStep {
    pub relation: Relation,
    pub plan: FetchPlan,
}
