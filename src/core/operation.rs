//! Query Description
//!
//! JSON form of a query, turned into a query tree against a schema:
//!
//! ```json
//! {
//!   "from": "Customers",
//!   "filter": [{"field": "Status", "op": "eq", "value": "active"}],
//!   "order": [{"field": "Id", "descending": true}],
//!   "skip": 10,
//!   "take": 5,
//!   "total_count": true
//! }
//! ```
//!
//! Operators apply in a fixed order: filter, order, select, skip, take,
//! then at most one of count / first / any.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::RequestContext;
use super::error::{CoreError, CoreResult};
use super::executor::ExecutionOptions;
use super::pipeline::QueryRequest;
use crate::expr::{BinaryOp, Expr, QueryType, SourceRef};
use crate::schema::{SchemaElement, SchemaModel};

/// Lambda parameter name used for generated predicates
const ITEM: &str = "it";

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn binary_op(&self) -> BinaryOp {
        match self {
            CompareOp::Eq => BinaryOp::Eq,
            CompareOp::Ne => BinaryOp::Ne,
            CompareOp::Gt => BinaryOp::Gt,
            CompareOp::Gte => BinaryOp::Ge,
            CompareOp::Lt => BinaryOp::Lt,
            CompareOp::Lte => BinaryOp::Le,
        }
    }
}

/// `field op value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

/// Sort key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderKey {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

/// A query against one named source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Collection, singleton or function name
    pub from: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Function arguments
    #[serde(default)]
    pub args: Vec<Value>,
    /// Conjunction of predicates
    #[serde(default)]
    pub filter: Vec<Predicate>,
    #[serde(default)]
    pub order: Vec<OrderKey>,
    /// Project a single property
    #[serde(default)]
    pub select: Option<String>,
    #[serde(default)]
    pub skip: Option<u64>,
    #[serde(default)]
    pub take: Option<u64>,
    #[serde(default)]
    pub count: bool,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub any: bool,
    #[serde(default)]
    pub total_count: bool,
}

impl QuerySpec {
    pub fn from_json(content: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Build the query tree.
    ///
    /// With `api_root`, collections and singletons are addressed as member
    /// accesses on the API root parameter instead of direct data references.
    /// Functions are always direct references.
    pub fn to_expr(&self, model: &SchemaModel, api_root: Option<&str>) -> CoreResult<Expr> {
        let terminals = [self.count, self.first, self.any].iter().filter(|t| **t).count();
        if terminals > 1 {
            return Err(CoreError::validation("At most one of count, first, any"));
        }

        let element = model
            .resolve(&self.from, self.namespace.as_deref())
            .ok_or_else(|| CoreError::validation(format!("Unknown source '{}'", self.from)))?;
        let entity = element.entity_type().to_string();
        let source_type = element.logical_type();

        let addressable = !matches!(element, SchemaElement::Function(_));
        let mut query = match api_root {
            Some(root) if addressable && self.namespace.is_none() => Expr::member(
                Expr::parameter(root, QueryType::Any),
                self.from.clone(),
                source_type.clone(),
            ),
            _ => Expr::source_ref(
                SourceRef {
                    namespace: self.namespace.clone(),
                    name: self.from.clone(),
                    args: self.args.iter().cloned().map(Expr::constant).collect(),
                },
                source_type.clone(),
            ),
        };

        let composes = !self.filter.is_empty()
            || !self.order.is_empty()
            || self.select.is_some()
            || self.skip.is_some()
            || self.take.is_some()
            || self.count
            || self.first
            || self.any;
        if composes && !source_type.is_collection() {
            return Err(CoreError::validation(format!(
                "'{}' is not a collection and cannot be composed",
                self.from
            )));
        }

        if let Some(predicate) = self.predicate(model, &entity)? {
            query = query.filter(predicate);
        }
        // sorts are stable; the first key is applied last so it dominates
        for key in self.order.iter().rev() {
            let selector = Expr::lambda(ITEM, field(model, &entity, &key.field)?);
            query = if key.descending {
                query.order_by_descending(selector)
            } else {
                query.order_by(selector)
            };
        }
        if let Some(property) = &self.select {
            query = query.select(Expr::lambda(ITEM, field(model, &entity, property)?));
        }
        if let Some(n) = self.skip {
            query = query.skip(n);
        }
        if let Some(n) = self.take {
            query = query.take(n);
        }
        if self.count {
            query = query.count();
        } else if self.first {
            query = query.first();
        } else if self.any {
            query = query.any();
        }
        Ok(query)
    }

    fn predicate(&self, model: &SchemaModel, entity: &str) -> CoreResult<Option<Expr>> {
        let mut body: Option<Expr> = None;
        for p in &self.filter {
            let test = Expr::binary(
                p.op.binary_op(),
                field(model, entity, &p.field)?,
                Expr::constant(p.value.clone()),
            );
            body = Some(match body {
                Some(acc) => Expr::and(acc, test),
                None => test,
            });
        }
        Ok(body.map(|b| Expr::lambda(ITEM, b)))
    }

    pub fn options(&self) -> ExecutionOptions {
        ExecutionOptions {
            include_total_count: self.total_count,
        }
    }

    /// Build a pipeline request
    pub fn to_request(
        &self,
        model: &SchemaModel,
        context: RequestContext,
        api_root: Option<&str>,
    ) -> CoreResult<QueryRequest> {
        Ok(QueryRequest {
            query: self.to_expr(model, api_root)?,
            context,
            options: self.options(),
        })
    }
}

fn field(model: &SchemaModel, entity: &str, name: &str) -> CoreResult<Expr> {
    let item = Expr::parameter(ITEM, QueryType::entity(entity));
    Ok(model.property(item, name)?)
}
