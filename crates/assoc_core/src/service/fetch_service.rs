//! Eager fetch use-case service.
//!
//! # Responsibility
//! - Resolve a nesting spec into a plan, then load roots and related
//!   records level by level.
//! - Assemble one nested tree per root record.
//!
//! # Invariants
//! - The whole spec is validated before the first query runs.
//! - Roots and children keep insertion order; children are grouped under
//!   their parent without re-sorting.
//! - Every parent gets every relation field of its plan node, empty when
//!   nothing matches.
//! - Any failed query fails the whole fetch; no partial tree is returned.

use crate::model::filter::RecordFilter;
use crate::model::nesting::{NestingParseError, NestingSpec};
use crate::model::record::{NestedRecord, Record, RecordId};
use crate::registry::relation_graph::{FetchPlan, FetchStep, RelationGraph};
use crate::registry::PlanError;
use crate::store::{RecordStore, StoreError};
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Maximum parent ids bound into one `IN (...)` child query.
const PARENT_BATCH_SIZE: usize = 500;

pub type FetchResult<T> = Result<T, FetchError>;

#[derive(Debug)]
pub enum FetchError {
    /// A nesting node names no relation reachable from its parent kind.
    InvalidNestingPath { path: String },
    UnknownEntityKind(String),
    Store(StoreError),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNestingPath { path } => write!(f, "invalid nesting path: {path}"),
            Self::UnknownEntityKind(kind) => write!(f, "unknown entity kind: {kind}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PlanError> for FetchError {
    fn from(value: PlanError) -> Self {
        match value {
            PlanError::UnknownEntityKind(kind) => Self::UnknownEntityKind(kind),
            PlanError::InvalidNestingPath { path } => Self::InvalidNestingPath { path },
        }
    }
}

impl From<NestingParseError> for FetchError {
    fn from(value: NestingParseError) -> Self {
        Self::InvalidNestingPath { path: value.path }
    }
}

impl From<StoreError> for FetchError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UnknownEntityKind(kind) => Self::UnknownEntityKind(kind),
            other => Self::Store(other),
        }
    }
}

/// Read-only nested retrieval over a record store.
pub struct EagerFetcher<'g, S: RecordStore> {
    graph: &'g RelationGraph,
    store: S,
}

impl<'g, S: RecordStore> EagerFetcher<'g, S> {
    pub fn new(graph: &'g RelationGraph, store: S) -> Self {
        Self { graph, store }
    }

    /// Loads `root_kind` records matching `filter` with the relations named
    /// by `spec` attached recursively.
    pub fn fetch(
        &self,
        root_kind: &str,
        spec: &NestingSpec,
        filter: Option<&RecordFilter>,
    ) -> FetchResult<Vec<NestedRecord>> {
        let started_at = Instant::now();
        let result = self.fetch_inner(root_kind, spec, filter);
        match &result {
            Ok(roots) => debug!(
                "event=fetch module=fetch status=ok root={} depth={} roots={} duration_ms={}",
                root_kind,
                spec.depth(),
                roots.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=fetch module=fetch status=error root={} duration_ms={} error={}",
                root_kind,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    /// Loads one root record by id, or `None` when it does not exist.
    pub fn fetch_one(
        &self,
        root_kind: &str,
        id: RecordId,
        spec: &NestingSpec,
    ) -> FetchResult<Option<NestedRecord>> {
        let filter = RecordFilter::by_id(id);
        Ok(self
            .fetch(root_kind, spec, Some(&filter))?
            .into_iter()
            .next())
    }

    /// Same as [`EagerFetcher::fetch`] with the nesting given as JSON, returning
    /// the serialized tree.
    pub fn fetch_json(
        &self,
        root_kind: &str,
        spec: &Value,
        filter: Option<&RecordFilter>,
    ) -> FetchResult<Value> {
        let spec = NestingSpec::from_json(spec)?;
        let roots = self.fetch(root_kind, &spec, filter)?;
        Ok(Value::Array(roots.iter().map(NestedRecord::to_json).collect()))
    }

    fn fetch_inner(
        &self,
        root_kind: &str,
        spec: &NestingSpec,
        filter: Option<&RecordFilter>,
    ) -> FetchResult<Vec<NestedRecord>> {
        let plan = self.graph.resolve_nesting(root_kind, spec)?;
        let match_all = RecordFilter::new();
        let roots = self.store.query(root_kind, filter.unwrap_or(&match_all))?;
        self.attach(&plan, roots)
    }

    fn attach(&self, plan: &FetchPlan, records: Vec<Record>) -> FetchResult<Vec<NestedRecord>> {
        let mut nested: Vec<NestedRecord> = records.into_iter().map(NestedRecord::new).collect();
        for step in &plan.steps {
            let mut grouped = self.load_children(step, &nested)?;
            for parent in &mut nested {
                let children = grouped.remove(&parent.record.id).unwrap_or_default();
                parent
                    .relations
                    .push((step.relation.alias.clone(), children));
            }
        }
        Ok(nested)
    }

    /// Loads and expands children of `parents` for one relation, grouped by
    /// parent id. Each parent's children land in a single batch, so their
    /// insertion order is kept.
    fn load_children(
        &self,
        step: &FetchStep,
        parents: &[NestedRecord],
    ) -> FetchResult<HashMap<RecordId, Vec<NestedRecord>>> {
        let relation = &step.relation;
        let mut grouped: HashMap<RecordId, Vec<NestedRecord>> = HashMap::new();

        for batch in parents.chunks(PARENT_BATCH_SIZE) {
            let parent_ids = batch
                .iter()
                .map(|parent| Value::String(parent.record.id.to_string()))
                .collect();
            let filter = RecordFilter::new().any_of(relation.foreign_key.clone(), parent_ids);
            let children = self.store.query(&relation.target, &filter)?;

            for child in self.attach(&step.plan, children)? {
                let parent_id = child
                    .record
                    .foreign_key(&relation.foreign_key)
                    .ok_or_else(|| {
                        FetchError::Store(StoreError::InvalidData(format!(
                            "`{}` record {} has no valid `{}`",
                            relation.target, child.record.id, relation.foreign_key
                        )))
                    })?;
                grouped.entry(parent_id).or_default().push(child);
            }
        }

        Ok(grouped)
    }
}
