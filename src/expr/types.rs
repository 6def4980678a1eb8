//! Static result types for query tree nodes
//!
//! Every node carries a `QueryType`. Rewrites must preserve it:
//! a replacement is accepted only if its type is assignable to the
//! type of the node it replaces.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Static type of a query tree node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "of", rename_all = "snake_case")]
pub enum QueryType {
    Bool,
    Int,
    Float,
    String,
    /// Accepts any value; the type of `null` constants
    Any,
    /// A structured entity type, by name
    Entity(String),
    /// An in-memory sequence of elements
    Sequence(Box<QueryType>),
    /// A composable query producing elements
    Queryable(Box<QueryType>),
}

impl QueryType {
    /// Entity type by name
    pub fn entity(name: impl Into<String>) -> Self {
        QueryType::Entity(name.into())
    }

    /// Sequence of `element`
    pub fn sequence(element: QueryType) -> Self {
        QueryType::Sequence(Box::new(element))
    }

    /// Composable query of `element`
    pub fn queryable(element: QueryType) -> Self {
        QueryType::Queryable(Box::new(element))
    }

    /// Returns the element type for sequence and queryable types
    pub fn element_type(&self) -> Option<&QueryType> {
        match self {
            QueryType::Sequence(e) | QueryType::Queryable(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true for sequence and queryable types
    pub fn is_collection(&self) -> bool {
        self.element_type().is_some()
    }

    /// Returns the entity name if this is an entity type
    pub fn entity_name(&self) -> Option<&str> {
        match self {
            QueryType::Entity(name) => Some(name),
            _ => None,
        }
    }

    /// Checks whether a value of type `other` may stand in for `self`.
    ///
    /// No numeric widening: `Int` is not assignable to `Float`.
    pub fn is_assignable_from(&self, other: &QueryType) -> bool {
        match (self, other) {
            (QueryType::Any, _) => true,
            (QueryType::Sequence(t), QueryType::Sequence(u))
            | (QueryType::Sequence(t), QueryType::Queryable(u))
            | (QueryType::Queryable(t), QueryType::Queryable(u)) => t.is_assignable_from(u),
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::Bool => write!(f, "bool"),
            QueryType::Int => write!(f, "int"),
            QueryType::Float => write!(f, "float"),
            QueryType::String => write!(f, "string"),
            QueryType::Any => write!(f, "any"),
            QueryType::Entity(name) => write!(f, "{}", name),
            QueryType::Sequence(e) => write!(f, "sequence<{}>", e),
            QueryType::Queryable(e) => write!(f, "queryable<{}>", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_types_assignable() {
        assert!(QueryType::Int.is_assignable_from(&QueryType::Int));
        assert!(QueryType::entity("Customer").is_assignable_from(&QueryType::entity("Customer")));
    }

    #[test]
    fn test_no_numeric_widening() {
        assert!(!QueryType::Float.is_assignable_from(&QueryType::Int));
        assert!(!QueryType::Int.is_assignable_from(&QueryType::Float));
    }

    #[test]
    fn test_any_accepts_everything() {
        assert!(QueryType::Any.is_assignable_from(&QueryType::queryable(QueryType::Int)));
        assert!(!QueryType::Int.is_assignable_from(&QueryType::Any));
    }

    #[test]
    fn test_sequence_accepts_queryable() {
        let seq = QueryType::sequence(QueryType::entity("Order"));
        let query = QueryType::queryable(QueryType::entity("Order"));

        assert!(seq.is_assignable_from(&query));
        assert!(!query.is_assignable_from(&seq));
    }

    #[test]
    fn test_element_mismatch_rejected() {
        let customers = QueryType::queryable(QueryType::entity("Customer"));
        let orders = QueryType::queryable(QueryType::entity("Order"));

        assert!(!customers.is_assignable_from(&orders));
    }

    #[test]
    fn test_display() {
        let ty = QueryType::queryable(QueryType::entity("Customer"));
        assert_eq!(ty.to_string(), "queryable<Customer>");
    }
}
