//! In-memory backend
//!
//! Rows live in named JSON collections. One store is one proxy: the
//! sourcer hands out native fragments tagged with the store's proxy id
//! and the executor refuses fragments from any other store.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::eval::Evaluator;
use crate::core::{
    BoxFuture, CoreError, CoreResult, ExecutionOptions, QueryExecutor, RequestContext,
    SequenceOutput,
};
use crate::expr::{Expr, NativeQueryable, NativeSource, ProxyId, QueryType};
use crate::observability::Logger;
use crate::rewrite::{RewriteContext, RewriteResult, SourceMode, Sourcer};
use crate::schema::SchemaElement;

/// Named collections of JSON rows
#[derive(Debug, Clone)]
pub struct MemoryStore {
    proxy: ProxyId,
    collections: HashMap<String, Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            proxy: ProxyId::new(),
            collections: HashMap::new(),
        }
    }

    /// Build a store from `{"Name": [rows...], ...}`
    pub fn from_json(data: &Value) -> CoreResult<Self> {
        let object = data
            .as_object()
            .ok_or_else(|| CoreError::validation("Data must be an object of collections"))?;
        let mut store = Self::new();
        for (name, rows) in object {
            let rows = rows.as_array().ok_or_else(|| {
                CoreError::validation(format!("Collection '{}' must be an array", name))
            })?;
            store.insert(name.clone(), rows.clone());
        }
        Ok(store)
    }

    pub fn with_collection(mut self, name: impl Into<String>, rows: Vec<Value>) -> Self {
        self.insert(name, rows);
        self
    }

    /// Replace the rows of `name`
    pub fn insert(&mut self, name: impl Into<String>, rows: Vec<Value>) {
        self.collections.insert(name.into(), rows);
    }

    pub fn proxy(&self) -> ProxyId {
        self.proxy
    }

    pub fn rows(&self, name: &str) -> Option<&[Value]> {
        self.collections.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub fn collection_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.collections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Root queryable over one stored collection
#[derive(Debug, Clone)]
pub struct MemoryQueryable {
    proxy: ProxyId,
    name: String,
    element: QueryType,
    ty: QueryType,
}

impl NativeQueryable for MemoryQueryable {
    fn proxy(&self) -> ProxyId {
        self.proxy
    }

    fn element_type(&self) -> &QueryType {
        &self.element
    }

    fn expression(&self) -> Expr {
        Expr::native(
            NativeSource {
                proxy: self.proxy,
                name: self.name.clone(),
            },
            self.ty.clone(),
        )
    }
}

/// Sources collections and singletons present in a store.
///
/// Composable functions have no stored rows; they must be expanded into
/// queries over collections before sourcing.
#[derive(Debug, Clone)]
pub struct MemorySourcer {
    store: Arc<MemoryStore>,
}

impl MemorySourcer {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

impl Sourcer for MemorySourcer {
    fn name(&self) -> &str {
        "memory"
    }

    fn source(&self, ctx: &RewriteContext<'_>, mode: SourceMode) -> RewriteResult<Option<Expr>> {
        let reference = match ctx.binding().as_data_reference() {
            Some(r) => r,
            None => return Ok(None),
        };
        if matches!(reference.element, SchemaElement::Function(_)) || !self.store.contains(&reference.name) {
            return Ok(None);
        }

        let ty = reference.logical_type();
        let element = ty.element_type().cloned().unwrap_or_else(|| ty.clone());
        let sourced = match mode {
            SourceMode::Root => Expr::queryable(Arc::new(MemoryQueryable {
                proxy: self.store.proxy(),
                name: reference.name.clone(),
                element,
                ty,
            })),
            SourceMode::Embedded => Expr::native(
                NativeSource {
                    proxy: self.store.proxy(),
                    name: reference.name.clone(),
                },
                ty,
            ),
        };
        Ok(Some(sourced))
    }
}

/// Executes sourced trees against a store
#[derive(Debug, Clone)]
pub struct MemoryExecutor {
    store: Arc<MemoryStore>,
}

impl MemoryExecutor {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    fn run(&self, query: &Expr, cancel: &CancellationToken) -> CoreResult<Value> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let value = Evaluator::new(&self.store).evaluate(query)?;
        Logger::trace(
            "MEMORY_QUERY",
            &[("proxy", self.store.proxy().to_string().as_str()), ("query", query.to_string().as_str())],
        );
        Ok(value)
    }
}

impl QueryExecutor for MemoryExecutor {
    fn execute_sequence<'a>(
        &'a self,
        _request: &'a RequestContext,
        query: &'a Expr,
        _options: ExecutionOptions,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, CoreResult<SequenceOutput>> {
        Box::pin(async move {
            match self.run(query, cancel)? {
                Value::Array(items) => Ok(SequenceOutput {
                    items,
                    total_count: None,
                }),
                other => Err(CoreError::execution(format!(
                    "Sequence query produced {}",
                    other
                ))),
            }
        })
    }

    fn execute_scalar<'a>(
        &'a self,
        _request: &'a RequestContext,
        query: &'a Expr,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, CoreResult<Value>> {
        Box::pin(async move { self.run(query, cancel) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conventions::testing::{model, rows};
    use crate::core::dispatch;
    use crate::rewrite::{HookRegistry, RewriteEngine, RewriteError};
    use serde_json::json;

    fn store() -> Arc<MemoryStore> {
        let mut store = MemoryStore::new();
        for (name, data) in rows() {
            store.insert(name, data);
        }
        Arc::new(store)
    }

    #[test]
    fn test_from_json() {
        let store = MemoryStore::from_json(&json!({"Orders": [{"Id": 1}], "Customers": []})).unwrap();
        assert_eq!(store.collection_names(), vec!["Customers", "Orders"]);
        assert_eq!(store.rows("Orders").map(|r| r.len()), Some(1));

        assert!(MemoryStore::from_json(&json!([1, 2])).is_err());
        assert!(MemoryStore::from_json(&json!({"Orders": 1})).is_err());
    }

    #[test]
    fn test_root_then_embedded_share_proxy() {
        let model = model();
        let store = store();
        let hooks = HookRegistry::builder()
            .sourcer(MemorySourcer::new(store.clone()))
            .build();
        let request = RequestContext::anonymous();
        let mut ctx = RewriteContext::new(&model, &hooks, &request);

        let customers = model.source_expr("Customers").unwrap();
        let orders_any = Expr::lambda("it", model.source_expr("Orders").unwrap().any());
        let query = customers.filter(orders_any);

        let rewritten = RewriteEngine::rewrite(&mut ctx, &query).unwrap();
        assert_eq!(rewritten.to_string(), "native(Customers).where(it => native(Orders).any())");
        assert_eq!(ctx.sourcing_calls(), 2);
        assert_eq!(ctx.root().map(|r| r.proxy()), Some(store.proxy()));
    }

    #[test]
    fn test_missing_rows_unsupported() {
        let model = model();
        let hooks = HookRegistry::builder()
            .sourcer(MemorySourcer::new(store()))
            .build();
        let request = RequestContext::anonymous();
        let mut ctx = RewriteContext::new(&model, &hooks, &request);

        let query = model.source_expr("Me").unwrap();
        let err = RewriteEngine::rewrite(&mut ctx, &query).unwrap_err();
        assert!(matches!(err, RewriteError::UnsupportedQuery(_)));
    }

    #[tokio::test]
    async fn test_execute_sourced_tree() {
        let model = model();
        let store = store();
        let hooks = HookRegistry::builder()
            .sourcer(MemorySourcer::new(store.clone()))
            .build();
        let request = RequestContext::anonymous();
        let query = model.source_expr("Customers").unwrap().take(1);
        let rewritten = {
            let mut ctx = RewriteContext::new(&model, &hooks, &request);
            RewriteEngine::rewrite(&mut ctx, &query).unwrap()
        };

        let executor = MemoryExecutor::new(store);
        let cancel = CancellationToken::new();
        let options = ExecutionOptions {
            include_total_count: true,
        };
        let result = dispatch(&executor, &request, &rewritten, options, &cancel)
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.total_count, Some(2));

        cancel.cancel();
        let err = dispatch(&executor, &request, &rewritten, options, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::Cancelled);
    }
}
