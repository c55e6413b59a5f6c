//! Record filters for store queries.

use crate::model::record::RecordId;
use serde_json::Value;

/// One equality condition. Several values mean "any of".
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// `id`, a declared attribute, or a foreign key.
    pub attribute: String,
    pub values: Vec<Value>,
}

/// Conjunction of equality conditions. The default filter matches all rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    conditions: Vec<FilterCondition>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `attribute = value`.
    pub fn eq(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.any_of(attribute, vec![value.into()])
    }

    /// Adds `attribute IN (values)`. An empty list matches nothing.
    pub fn any_of(mut self, attribute: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(FilterCondition {
            attribute: attribute.into(),
            values,
        });
        self
    }

    /// Shorthand for `id = id`.
    pub fn by_id(id: RecordId) -> Self {
        Self::new().eq("id", id.to_string())
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
