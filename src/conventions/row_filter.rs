//! Row filters
//!
//! Filters wrapping data references in `where` so only permitted rows
//! flow out of a collection. `RowSecurityFilter` is the ownership policy:
//! a row is visible to the user whose id is in its owner field.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::{referenced_collection, ITEM};
use crate::expr::{Expr, QueryType};
use crate::rewrite::{Filter, RewriteContext, RewriteError, RewriteResult};

/// Owner field used when none is configured
pub const DEFAULT_OWNER_FIELD: &str = "owner_id";

type PredicateBuilder = Arc<dyn Fn(Expr) -> Expr + Send + Sync>;

/// Element parameter for a predicate over the visited collection
fn item_parameter(ctx: &RewriteContext<'_>) -> Option<Expr> {
    let node = ctx.node()?;
    if !node.ty().is_collection() {
        return None;
    }
    let element = ctx.binding().element_type()?;
    Some(Expr::parameter(ITEM, element))
}

/// Per-collection predicates
#[derive(Clone, Default)]
pub struct CollectionFilter {
    predicates: HashMap<String, PredicateBuilder>,
}

impl CollectionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `collection` to rows satisfying the predicate built over
    /// the row parameter
    pub fn on_filter<F>(mut self, collection: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(Expr) -> Expr + Send + Sync + 'static,
    {
        self.predicates.insert(collection.into(), Arc::new(predicate));
        self
    }
}

impl fmt::Debug for CollectionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.predicates.keys().collect();
        names.sort();
        f.debug_struct("CollectionFilter")
            .field("collections", &names)
            .finish()
    }
}

impl Filter for CollectionFilter {
    fn name(&self) -> &str {
        "collection_filter"
    }

    fn filter(&self, ctx: &RewriteContext<'_>) -> RewriteResult<Option<Expr>> {
        let (_, collection) = match referenced_collection(ctx) {
            Some(found) => found,
            None => return Ok(None),
        };
        let (builder, item) = match (self.predicates.get(&collection), item_parameter(ctx)) {
            (Some(builder), Some(item)) => (builder, item),
            _ => return Ok(None),
        };
        let predicate = builder(item);
        if predicate.ty() != &QueryType::Bool {
            return Err(RewriteError::hook(
                self.name(),
                format!("Predicate for {} is {}, not bool", collection, predicate.ty()),
            ));
        }
        Ok(ctx
            .node()
            .map(|node| node.clone().filter(Expr::lambda(ITEM, predicate))))
    }
}

/// Ownership-based row-level security
#[derive(Debug, Clone)]
pub struct RowSecurityFilter {
    owner_field: String,
    protected: HashSet<String>,
}

impl RowSecurityFilter {
    pub fn new(owner_field: impl Into<String>) -> Self {
        Self {
            owner_field: owner_field.into(),
            protected: HashSet::new(),
        }
    }

    /// Apply ownership filtering to `collection`
    pub fn protect(mut self, collection: impl Into<String>) -> Self {
        self.protected.insert(collection.into());
        self
    }

    pub fn owner_field(&self) -> &str {
        &self.owner_field
    }

    pub fn is_protected(&self, collection: &str) -> bool {
        self.protected.contains(collection)
    }
}

impl Default for RowSecurityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_OWNER_FIELD)
    }
}

impl Filter for RowSecurityFilter {
    fn name(&self) -> &str {
        "row_security"
    }

    fn filter(&self, ctx: &RewriteContext<'_>) -> RewriteResult<Option<Expr>> {
        // Service role bypasses row security
        if ctx.request().bypass_row_security() {
            return Ok(None);
        }
        let (_, collection) = match referenced_collection(ctx) {
            Some(found) => found,
            None => return Ok(None),
        };
        if !self.is_protected(&collection) {
            return Ok(None);
        }
        let item = match item_parameter(ctx) {
            Some(item) => item,
            None => return Ok(None),
        };

        let user_id = ctx.request().auth.require_user_id().map_err(|reason| {
            RewriteError::AccessDenied(format!("{} for {}", reason, collection))
        })?;
        let owner = ctx
            .model()
            .property(item, &self.owner_field)
            .map_err(|e| RewriteError::hook(self.name(), e.message()))?;
        let predicate = Expr::eq(owner, Expr::constant(Value::String(user_id.to_string())));

        Ok(ctx
            .node()
            .map(|node| node.clone().filter(Expr::lambda(ITEM, predicate))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conventions::testing::model;
    use crate::core::RequestContext;
    use crate::rewrite::HookRegistry;
    use crate::schema::SchemaModel;
    use serde_json::json;
    use uuid::Uuid;

    fn apply(
        filter: &dyn Filter,
        model: &SchemaModel,
        request: &RequestContext,
        query: &Expr,
    ) -> RewriteResult<Option<Expr>> {
        let hooks = HookRegistry::builder().build();
        let mut ctx = RewriteContext::new(model, &hooks, request);
        ctx.push(Some(query))?;
        filter.filter(&ctx)
    }

    fn active_only() -> CollectionFilter {
        CollectionFilter::new().on_filter("Customers", |it| {
            Expr::eq(
                Expr::member(it, "Status", QueryType::String),
                Expr::constant(json!("active")),
            )
        })
    }

    #[test]
    fn test_collection_filter_wraps_reference() {
        let model = model();
        let query = model.source_expr("Customers").unwrap();
        let filtered = apply(&active_only(), &model, &RequestContext::anonymous(), &query)
            .unwrap()
            .unwrap();

        assert_eq!(
            filtered.to_string(),
            r#"source(Customers).where(it => (it.Status == "active"))"#
        );
        assert_eq!(filtered.ty(), query.ty());
    }

    #[test]
    fn test_collection_filter_ignores_other_collections() {
        let model = model();
        let query = model.source_expr("Orders").unwrap();
        let filtered = apply(&active_only(), &model, &RequestContext::anonymous(), &query).unwrap();
        assert!(filtered.is_none());
    }

    #[test]
    fn test_non_boolean_predicate_rejected() {
        let model = model();
        let filter = CollectionFilter::new()
            .on_filter("Customers", |it| Expr::member(it, "Id", QueryType::Int));
        let query = model.source_expr("Customers").unwrap();
        let err = apply(&filter, &model, &RequestContext::anonymous(), &query).unwrap_err();
        assert!(matches!(err, RewriteError::Hook { .. }));
    }

    #[test]
    fn test_row_security_scopes_to_owner() {
        let model = model();
        let user = Uuid::new_v4();
        let filter = RowSecurityFilter::default().protect("Customers");
        let query = model.source_expr("Customers").unwrap();

        let filtered = apply(&filter, &model, &RequestContext::for_user(user), &query)
            .unwrap()
            .unwrap();
        assert_eq!(
            filtered.to_string(),
            format!(r#"source(Customers).where(it => (it.owner_id == "{}"))"#, user)
        );
    }

    #[test]
    fn test_row_security_denies_anonymous() {
        let model = model();
        let filter = RowSecurityFilter::default().protect("Customers");
        let query = model.source_expr("Customers").unwrap();

        let err = apply(&filter, &model, &RequestContext::anonymous(), &query).unwrap_err();
        assert!(matches!(err, RewriteError::AccessDenied(_)));
        assert!(err.is_authorization());
    }

    #[test]
    fn test_row_security_service_role_bypass() {
        let model = model();
        let filter = RowSecurityFilter::default().protect("Customers");
        let query = model.source_expr("Customers").unwrap();

        let filtered = apply(&filter, &model, &RequestContext::service_role(), &query).unwrap();
        assert!(filtered.is_none());
    }

    #[test]
    fn test_row_security_skips_singletons() {
        let model = model();
        let filter = RowSecurityFilter::default().protect("Me");
        let query = model.source_expr("Me").unwrap();

        let filtered = apply(&filter, &model, &RequestContext::anonymous(), &query).unwrap();
        assert!(filtered.is_none());
    }
}
