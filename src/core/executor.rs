//! Query Executor
//!
//! Contract between the pipeline and a backend. The pipeline hands over a
//! fully sourced tree; the backend runs it either as a sequence or as a
//! scalar query, chosen once from the tree's static type.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::context::RequestContext;
use super::error::{CoreError, CoreResult};
use super::result::{QueryResult, ResultShape};
use crate::expr::Expr;

/// Boxed future returned by executors
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-request execution options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Report the row count ignoring outermost `skip`/`take`
    pub include_total_count: bool,
}

/// Rows produced by a sequence query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceOutput {
    pub items: Vec<Value>,
    pub total_count: Option<u64>,
}

/// Backend executing fully sourced query trees
pub trait QueryExecutor: Send + Sync {
    /// Run a sequence-typed query
    fn execute_sequence<'a>(
        &'a self,
        request: &'a RequestContext,
        query: &'a Expr,
        options: ExecutionOptions,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, CoreResult<SequenceOutput>>;

    /// Run a scalar-typed query
    fn execute_scalar<'a>(
        &'a self,
        request: &'a RequestContext,
        query: &'a Expr,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, CoreResult<Value>>;
}

/// Dispatch `query` on its result shape.
///
/// When a total count is requested and the backend does not report one,
/// it is computed as a scalar count over the query with its outermost
/// paging stripped. Backend errors are returned unchanged.
pub async fn dispatch(
    executor: &dyn QueryExecutor,
    request: &RequestContext,
    query: &Expr,
    options: ExecutionOptions,
    cancel: &CancellationToken,
) -> CoreResult<QueryResult> {
    match ResultShape::of(query.ty()) {
        ResultShape::Sequence => {
            let output = executor
                .execute_sequence(request, query, options, cancel)
                .await?;
            let total = match (options.include_total_count, output.total_count) {
                (false, _) => None,
                (true, Some(total)) => Some(total),
                (true, None) => {
                    let counted = query.strip_paging().count();
                    let value = executor.execute_scalar(request, &counted, cancel).await?;
                    Some(value.as_u64().ok_or_else(|| {
                        CoreError::execution(format!("Total count is not a number: {}", value))
                    })?)
                }
            };
            let result = QueryResult::sequence(output.items);
            Ok(match total {
                Some(total) => result.with_total_count(total),
                None => result,
            })
        }
        ResultShape::Scalar => {
            let value = executor.execute_scalar(request, query, cancel).await?;
            Ok(QueryResult::scalar(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ExprKind, QueryMethod, QueryType};
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every query it is asked to run
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    impl QueryExecutor for Recording {
        fn execute_sequence<'a>(
            &'a self,
            _request: &'a RequestContext,
            query: &'a Expr,
            _options: ExecutionOptions,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, CoreResult<SequenceOutput>> {
            self.seen.lock().unwrap().push(format!("seq:{}", query));
            Box::pin(async move {
                Ok(SequenceOutput {
                    items: vec![json!({"Id": 1}), json!({"Id": 2})],
                    total_count: None,
                })
            })
        }

        fn execute_scalar<'a>(
            &'a self,
            _request: &'a RequestContext,
            query: &'a Expr,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, CoreResult<Value>> {
            self.seen.lock().unwrap().push(format!("scalar:{}", query));
            let is_count = matches!(query.kind(), ExprKind::Call { method: QueryMethod::Count, .. });
            Box::pin(async move {
                if is_count {
                    Ok(json!(40))
                } else {
                    Err(CoreError::execution("backend unavailable"))
                }
            })
        }
    }

    fn customers() -> Expr {
        Expr::source("Customers", QueryType::queryable(QueryType::entity("Customer")))
    }

    #[tokio::test]
    async fn test_sequence_dispatch() {
        let executor = Recording::default();
        let request = RequestContext::anonymous();
        let cancel = CancellationToken::new();

        let result = dispatch(&executor, &request, &customers(), ExecutionOptions::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(result.shape, ResultShape::Sequence);
        assert_eq!(result.len(), 2);
        assert_eq!(result.total_count, None);
    }

    #[tokio::test]
    async fn test_total_count_strips_paging() {
        let executor = Recording::default();
        let request = RequestContext::anonymous();
        let cancel = CancellationToken::new();
        let options = ExecutionOptions {
            include_total_count: true,
        };

        let query = customers().skip(10).take(2);
        let result = dispatch(&executor, &request, &query, options, &cancel).await.unwrap();

        assert_eq!(result.total_count, Some(40));
        let seen = executor.seen.lock().unwrap();
        assert_eq!(seen[1], "scalar:source(Customers).count()");
    }

    #[tokio::test]
    async fn test_scalar_dispatch() {
        let executor = Recording::default();
        let request = RequestContext::anonymous();
        let cancel = CancellationToken::new();

        let result = dispatch(&executor, &request, &customers().count(), ExecutionOptions::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(result.shape, ResultShape::Scalar);
        assert_eq!(result.scalar_value(), Some(&json!(40)));
    }

    #[tokio::test]
    async fn test_backend_error_propagates_unchanged() {
        let executor = Recording::default();
        let request = RequestContext::anonymous();
        let cancel = CancellationToken::new();

        let err = dispatch(&executor, &request, &customers().any(), ExecutionOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::execution("backend unavailable"));
    }
}
