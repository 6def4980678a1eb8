//! Query results

use serde::Serialize;
use serde_json::Value;

use crate::expr::QueryType;

/// Whether a query yields a sequence of rows or a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    Sequence,
    Scalar,
}

impl ResultShape {
    /// Shape of a query whose static type is `ty`
    pub fn of(ty: &QueryType) -> ResultShape {
        if ty.is_collection() {
            ResultShape::Sequence
        } else {
            ResultShape::Scalar
        }
    }
}

/// In-memory query result.
///
/// Scalars are carried as a one-element sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub shape: ResultShape,
    pub results: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl QueryResult {
    pub fn sequence(results: Vec<Value>) -> Self {
        Self {
            shape: ResultShape::Sequence,
            results,
            total_count: None,
            collection: None,
        }
    }

    pub fn scalar(value: Value) -> Self {
        Self {
            shape: ResultShape::Scalar,
            results: vec![value],
            total_count: None,
            collection: None,
        }
    }

    pub fn with_total_count(mut self, total: u64) -> Self {
        self.total_count = Some(total);
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// The scalar value, if this is a scalar result
    pub fn scalar_value(&self) -> Option<&Value> {
        match self.shape {
            ResultShape::Scalar => self.results.first(),
            ResultShape::Sequence => None,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// JSON rendering for responses
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
