//! Pipeline Lifecycle Tests
//!
//! Request filter ordering, result replacement, failure and cancellation
//! paths, total counts and metrics across whole requests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use aeroquery::backend::{MemoryExecutor, MemorySourcer, MemoryStore};
use aeroquery::core::{
    BoxFuture, CoreError, CoreResult, ExecutionOptions, QueryExecutor, QueryPipeline,
    QueryRequest, QueryResult, RequestContext, RequestFilter, RequestFilterContext, RequestState,
    ResultShape, SequenceOutput,
};
use aeroquery::expr::Expr;
use aeroquery::rewrite::HookRegistry;
use aeroquery::schema::{EntityType, FieldDef, SchemaModel};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Helper Functions
// =============================================================================

fn model() -> Arc<SchemaModel> {
    let mut customer = HashMap::new();
    customer.insert("Id".to_string(), FieldDef::required_int());
    customer.insert("Status".to_string(), FieldDef::required_string());
    Arc::new(
        SchemaModel::new("Sales")
            .with_entity_type(EntityType::new("Customer", customer).with_key(&["Id"]))
            .and_then(|m| m.with_collection("Customers", "Customer"))
            .unwrap(),
    )
}

fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new().with_collection(
        "Customers",
        vec![
            json!({"Id": 1, "Status": "active"}),
            json!({"Id": 2, "Status": "closed"}),
            json!({"Id": 3, "Status": "active"}),
        ],
    ))
}

fn memory_pipeline() -> aeroquery::core::QueryPipelineBuilder {
    let store = store();
    let hooks = HookRegistry::builder()
        .sourcer(MemorySourcer::new(store.clone()))
        .build();
    QueryPipeline::builder(model(), hooks, Arc::new(MemoryExecutor::new(store)))
}

fn customers(pipeline: &QueryPipeline) -> Expr {
    pipeline.model().source_expr("Customers").unwrap()
}

fn request(query: Expr) -> QueryRequest {
    QueryRequest::new(query, RequestContext::anonymous())
}

/// Appends `pre:<name>` and `post:<name>` to a shared log
struct Tracer {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl RequestFilter for Tracer {
    fn name(&self) -> &str {
        self.name
    }

    fn filter_request<'a>(
        &'a self,
        _ctx: &'a mut RequestFilterContext<'_>,
    ) -> BoxFuture<'a, CoreResult<()>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("pre:{}", self.name));
            Ok(())
        })
    }

    fn filter_result<'a>(
        &'a self,
        _ctx: &'a mut RequestFilterContext<'_>,
    ) -> BoxFuture<'a, CoreResult<()>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("post:{}", self.name));
            Ok(())
        })
    }
}

/// Drops the `Status` property from every row
struct Redact;

impl RequestFilter for Redact {
    fn name(&self) -> &str {
        "redact"
    }

    fn filter_result<'a>(
        &'a self,
        ctx: &'a mut RequestFilterContext<'_>,
    ) -> BoxFuture<'a, CoreResult<()>> {
        Box::pin(async move {
            if let Some(result) = ctx.result_mut() {
                for row in result.results.iter_mut() {
                    if let Some(obj) = row.as_object_mut() {
                        obj.remove("Status");
                    }
                }
            }
            Ok(())
        })
    }
}

/// Refuses every request
struct Gate;

impl RequestFilter for Gate {
    fn name(&self) -> &str {
        "gate"
    }

    fn filter_request<'a>(
        &'a self,
        _ctx: &'a mut RequestFilterContext<'_>,
    ) -> BoxFuture<'a, CoreResult<()>> {
        Box::pin(async { Err(CoreError::request_filter("gate", "closed")) })
    }
}

/// Cancels the request from inside pre-filtering
struct CancelOnEntry;

impl RequestFilter for CancelOnEntry {
    fn name(&self) -> &str {
        "cancel_on_entry"
    }

    fn filter_request<'a>(
        &'a self,
        ctx: &'a mut RequestFilterContext<'_>,
    ) -> BoxFuture<'a, CoreResult<()>> {
        Box::pin(async move {
            ctx.cancel_token().cancel();
            Ok(())
        })
    }
}

/// Executor that never finishes
struct Stalled;

impl QueryExecutor for Stalled {
    fn execute_sequence<'a>(
        &'a self,
        _request: &'a RequestContext,
        _query: &'a Expr,
        _options: ExecutionOptions,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, CoreResult<SequenceOutput>> {
        Box::pin(std::future::pending::<CoreResult<SequenceOutput>>())
    }

    fn execute_scalar<'a>(
        &'a self,
        _request: &'a RequestContext,
        _query: &'a Expr,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, CoreResult<Value>> {
        Box::pin(std::future::pending::<CoreResult<Value>>())
    }
}

// =============================================================================
// Filter Ordering
// =============================================================================

#[tokio::test]
async fn test_pre_filters_reverse_post_filters_forward() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = memory_pipeline()
        .with_filter(Tracer { name: "outer", log: log.clone() })
        .with_filter(Tracer { name: "inner", log: log.clone() })
        .build();
    assert_eq!(pipeline.filter_count(), 2);

    let query = customers(&pipeline);
    pipeline
        .execute(request(query), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["pre:inner", "pre:outer", "post:outer", "post:inner"]
    );
}

#[tokio::test]
async fn test_full_lifecycle_history() {
    let pipeline = memory_pipeline().build();
    let query = customers(&pipeline);

    let (result, lifecycle) = pipeline
        .execute_traced(request(query), &CancellationToken::new())
        .await;

    assert!(result.is_ok());
    assert_eq!(
        lifecycle.history(),
        &[
            RequestState::Received,
            RequestState::PreFiltering,
            RequestState::Rewriting,
            RequestState::Executing,
            RequestState::PostFiltering,
            RequestState::Completed
        ]
    );
}

// =============================================================================
// Result Replacement
// =============================================================================

#[tokio::test]
async fn test_post_filter_edits_result() {
    let pipeline = memory_pipeline().with_filter(Redact).build();
    let query = customers(&pipeline).take(1);

    let result = pipeline
        .execute(request(query), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.results, vec![json!({"Id": 1})]);
    assert_eq!(result.collection.as_deref(), Some("Customers"));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_pre_filter_error_fails_request() {
    let pipeline = memory_pipeline().with_filter(Gate).build();
    let query = customers(&pipeline);

    let (result, lifecycle) = pipeline
        .execute_traced(request(query), &CancellationToken::new())
        .await;

    let err = result.unwrap_err();
    assert_eq!(err, CoreError::request_filter("gate", "closed"));
    assert_eq!(err.status_code(), 400);
    assert_eq!(
        lifecycle.history(),
        &[RequestState::Received, RequestState::PreFiltering, RequestState::Failed]
    );

    let metrics = pipeline.metrics().snapshot();
    assert_eq!(metrics.requests_failed, 1);
    assert_eq!(metrics.rewrites_completed, 0);
}

#[tokio::test]
async fn test_unknown_source_reported() {
    let pipeline = memory_pipeline().build();
    let ty = customers(&pipeline).ty().clone();
    let query = Expr::source("Suppliers", ty);

    let err = pipeline
        .execute(request(query), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 404);
    assert_eq!(err.code(), "AERO_REWRITE_UNKNOWN_SOURCE");
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancelled_during_pre_filtering() {
    let pipeline = memory_pipeline().with_filter(CancelOnEntry).build();
    let query = customers(&pipeline);

    let (result, lifecycle) = pipeline
        .execute_traced(request(query), &CancellationToken::new())
        .await;

    assert_eq!(result, Err(CoreError::Cancelled));
    assert_eq!(lifecycle.state(), RequestState::Failed);
    assert!(!lifecycle.history().contains(&RequestState::Rewriting));
    assert_eq!(pipeline.metrics().snapshot().requests_cancelled, 1);
}

#[tokio::test]
async fn test_cancelled_while_executing() {
    let store = store();
    let hooks = HookRegistry::builder()
        .sourcer(MemorySourcer::new(store))
        .build();
    let pipeline = QueryPipeline::builder(model(), hooks, Arc::new(Stalled)).build();
    let query = customers(&pipeline);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let (result, lifecycle) = pipeline.execute_traced(request(query), &cancel).await;

    assert_eq!(result, Err(CoreError::Cancelled));
    assert_eq!(
        lifecycle.history(),
        &[
            RequestState::Received,
            RequestState::PreFiltering,
            RequestState::Rewriting,
            RequestState::Executing,
            RequestState::Failed
        ]
    );
}

// =============================================================================
// Result Shape and Total Count
// =============================================================================

#[tokio::test]
async fn test_total_count_ignores_paging() {
    let pipeline = memory_pipeline().build();
    let query = customers(&pipeline).skip(1).take(1);

    let result = pipeline
        .execute(request(query).with_total_count(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.shape, ResultShape::Sequence);
    assert_eq!(result.results, vec![json!({"Id": 2, "Status": "closed"})]);
    assert_eq!(result.total_count, Some(3));
}

#[tokio::test]
async fn test_scalar_query_shape() {
    let pipeline = memory_pipeline().build();
    let query = customers(&pipeline).any();

    let result = pipeline
        .execute(request(query), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result, QueryResult::scalar(json!(true)).with_collection("Customers"));
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test]
async fn test_metrics_accumulate_across_requests() {
    let pipeline = memory_pipeline().build();

    for _ in 0..2 {
        let query = customers(&pipeline);
        pipeline
            .execute(request(query), &CancellationToken::new())
            .await
            .unwrap();
    }

    let metrics = pipeline.metrics().snapshot();
    assert_eq!(metrics.requests_received, 2);
    assert_eq!(metrics.requests_completed, 2);
    assert_eq!(metrics.rewrites_completed, 2);
    assert_eq!(metrics.sourcing_calls, 2);
    assert_eq!(metrics.queries_executed, 2);
    assert_eq!(metrics.rows_returned, 6);
}
