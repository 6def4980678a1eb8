//! Query Pipeline
//!
//! Ties the stages of one request together:
//! pre-filters → rewrite → execute → post-filters.
//!
//! The schema, hook registry, executor and request filters are shared
//! read-only across requests. The cancellation token is checked at every
//! stage boundary and raced against each backend call; the tree walk
//! itself is synchronous and never checks it.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::context::RequestContext;
use super::error::{CoreError, CoreResult};
use super::executor::{dispatch, ExecutionOptions, QueryExecutor};
use super::filters::{RequestFilter, RequestFilterContext};
use super::result::QueryResult;
use super::state::{RequestLifecycle, RequestState};
use crate::expr::Expr;
use crate::observability::{log_event, Event, MetricsRegistry, ObservationScope};
use crate::rewrite::{HookRegistry, RewriteContext, RewriteEngine, RewriteError, DEFAULT_MAX_DEPTH};
use crate::schema::SchemaModel;

/// One query request
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query: Expr,
    pub context: RequestContext,
    pub options: ExecutionOptions,
}

impl QueryRequest {
    pub fn new(query: Expr, context: RequestContext) -> Self {
        Self {
            query,
            context,
            options: ExecutionOptions::default(),
        }
    }

    pub fn with_total_count(mut self) -> Self {
        self.options.include_total_count = true;
        self
    }
}

/// Output of the rewrite stage
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    /// Fully sourced tree
    pub query: Expr,
    pub originating_collection: Option<String>,
    pub sourcing_calls: usize,
}

/// The query pipeline
pub struct QueryPipeline {
    model: Arc<SchemaModel>,
    hooks: Arc<HookRegistry>,
    executor: Arc<dyn QueryExecutor>,
    filters: Vec<Arc<dyn RequestFilter>>,
    metrics: Arc<MetricsRegistry>,
    max_depth: usize,
}

impl QueryPipeline {
    pub fn builder(
        model: Arc<SchemaModel>,
        hooks: Arc<HookRegistry>,
        executor: Arc<dyn QueryExecutor>,
    ) -> QueryPipelineBuilder {
        QueryPipelineBuilder {
            pipeline: QueryPipeline {
                model,
                hooks,
                executor,
                filters: Vec::new(),
                metrics: Arc::new(MetricsRegistry::new()),
                max_depth: DEFAULT_MAX_DEPTH,
            },
        }
    }

    pub fn model(&self) -> &SchemaModel {
        &self.model
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Number of request filters
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Rewrite `query` for `request` without executing it
    pub fn rewrite(&self, query: &Expr, request: &RequestContext) -> CoreResult<RewriteOutcome> {
        let mut ctx =
            RewriteContext::new(&self.model, &self.hooks, request).with_max_depth(self.max_depth);
        let rewritten = RewriteEngine::rewrite(&mut ctx, query);

        let calls = ctx.sourcing_calls();
        self.metrics.add_sourcing_calls(calls as u64);
        let rewritten = rewritten.map_err(|e| {
            if matches!(e, RewriteError::InspectionFailed { .. }) {
                self.metrics.increment_inspection_denials();
            }
            e
        })?;
        let (_, originating_collection) = ctx.finish();
        self.metrics.increment_rewrites();

        Ok(RewriteOutcome {
            query: rewritten,
            originating_collection,
            sourcing_calls: calls,
        })
    }

    /// Run a request through every stage
    pub async fn execute(&self, request: QueryRequest, cancel: &CancellationToken) -> CoreResult<QueryResult> {
        self.execute_traced(request, cancel).await.0
    }

    /// Run a request, also returning the lifecycle it went through
    pub async fn execute_traced(
        &self,
        request: QueryRequest,
        cancel: &CancellationToken,
    ) -> (CoreResult<QueryResult>, RequestLifecycle) {
        let request_id = request.context.request_id.to_string();
        self.metrics.increment_requests_received();
        log_event(
            Event::RequestReceived,
            &[
                ("query", request.query.to_string().as_str()),
                ("request_id", request_id.as_str()),
            ],
        );

        let mut lifecycle = RequestLifecycle::new();
        let outcome = self.run(&request, cancel, &mut lifecycle).await;

        match &outcome {
            Ok(result) => {
                if lifecycle.state() == RequestState::Completed {
                    self.metrics.increment_requests_completed();
                    self.metrics.add_rows_returned(result.len() as u64);
                    log_event(
                        Event::RequestCompleted,
                        &[
                            ("elapsed_ms", request.context.elapsed_ms().to_string().as_str()),
                            ("request_id", request_id.as_str()),
                            ("rows", result.len().to_string().as_str()),
                        ],
                    );
                }
            }
            Err(CoreError::Cancelled) => {
                lifecycle.fail();
                self.metrics.increment_requests_cancelled();
                log_event(Event::RequestCancelled, &[("request_id", request_id.as_str())]);
            }
            Err(e) => {
                let failed_in = lifecycle.state();
                lifecycle.fail();
                self.metrics.increment_requests_failed();
                log_event(
                    Event::RequestFailed,
                    &[
                        ("code", e.code()),
                        ("message", e.to_string().as_str()),
                        ("request_id", request_id.as_str()),
                        ("stage", failed_in.as_str()),
                    ],
                );
            }
        }

        (outcome, lifecycle)
    }

    async fn run(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
        lifecycle: &mut RequestLifecycle,
    ) -> CoreResult<QueryResult> {
        check_cancelled(cancel)?;
        lifecycle.transition(RequestState::PreFiltering)?;
        let mut filter_ctx = RequestFilterContext::new(&request.context, &request.query, cancel);
        for filter in self.filters.iter().rev() {
            filter.filter_request(&mut filter_ctx).await?;
            if filter_ctx.result().is_some() {
                lifecycle.transition(RequestState::ShortCircuited)?;
                self.metrics.increment_short_circuits();
                log_event(
                    Event::RequestShortCircuited,
                    &[
                        ("filter", filter.name()),
                        ("request_id", request.context.request_id.to_string().as_str()),
                    ],
                );
                return filter_ctx
                    .take_result()
                    .ok_or_else(|| CoreError::request_filter(filter.name(), "Result vanished"));
            }
        }

        check_cancelled(cancel)?;
        lifecycle.transition(RequestState::Rewriting)?;
        let scope = ObservationScope::with_fields(
            "REWRITE",
            &[("request_id", request.context.request_id.to_string().as_str())],
        );
        let rewritten = match self.rewrite(&request.query, &request.context) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                scope.fail(&e.to_string());
                return Err(e);
            }
        };
        scope.complete_with_fields(&[
            ("collection", rewritten.originating_collection.as_deref().unwrap_or("")),
            ("query", rewritten.query.to_string().as_str()),
        ]);
        log_event(
            Event::RewriteComplete,
            &[("sourcing_calls", rewritten.sourcing_calls.to_string().as_str())],
        );

        check_cancelled(cancel)?;
        lifecycle.transition(RequestState::Executing)?;
        let mut result = until_cancelled(
            cancel,
            dispatch(
                self.executor.as_ref(),
                &request.context,
                &rewritten.query,
                request.options,
                cancel,
            ),
        )
        .await?;
        if let Some(collection) = rewritten.originating_collection {
            result = result.with_collection(collection);
        }
        self.metrics.increment_queries_executed();
        log_event(
            Event::QueryExecuted,
            &[("rows", result.len().to_string().as_str())],
        );

        check_cancelled(cancel)?;
        lifecycle.transition(RequestState::PostFiltering)?;
        filter_ctx.set_result(result);
        for filter in &self.filters {
            filter.filter_result(&mut filter_ctx).await?;
        }
        let result = filter_ctx
            .take_result()
            .ok_or_else(|| CoreError::request_filter("post", "A post-filter removed the result"))?;

        lifecycle.transition(RequestState::Completed)?;
        Ok(result)
    }
}

fn check_cancelled(cancel: &CancellationToken) -> CoreResult<()> {
    if cancel.is_cancelled() {
        Err(CoreError::Cancelled)
    } else {
        Ok(())
    }
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = CoreResult<T>>,
) -> CoreResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CoreError::Cancelled),
        result = fut => result,
    }
}

/// Builder for pipeline construction
pub struct QueryPipelineBuilder {
    pipeline: QueryPipeline,
}

impl QueryPipelineBuilder {
    /// Add a request filter
    pub fn with_filter(mut self, filter: impl RequestFilter + 'static) -> Self {
        self.pipeline.filters.push(Arc::new(filter));
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.pipeline.metrics = metrics;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.pipeline.max_depth = max_depth;
        self
    }

    pub fn build(self) -> QueryPipeline {
        self.pipeline
    }
}
