//! Request Filters
//!
//! Hooks wrapping the whole request. Pre-filters run in reverse
//! registration order before rewriting; setting a result short-circuits
//! the request. Post-filters run in registration order after execution
//! and may replace the result.

use tokio_util::sync::CancellationToken;

use super::context::RequestContext;
use super::error::CoreResult;
use super::executor::BoxFuture;
use super::result::QueryResult;
use crate::expr::Expr;

/// What a request filter sees
pub struct RequestFilterContext<'a> {
    request: &'a RequestContext,
    query: &'a Expr,
    cancel: &'a CancellationToken,
    result: Option<QueryResult>,
}

impl<'a> RequestFilterContext<'a> {
    pub fn new(request: &'a RequestContext, query: &'a Expr, cancel: &'a CancellationToken) -> Self {
        Self {
            request,
            query,
            cancel,
            result: None,
        }
    }

    pub fn request(&self) -> &'a RequestContext {
        self.request
    }

    /// The query as submitted, before rewriting
    pub fn query(&self) -> &'a Expr {
        self.query
    }

    pub fn cancel_token(&self) -> &'a CancellationToken {
        self.cancel
    }

    pub fn result(&self) -> Option<&QueryResult> {
        self.result.as_ref()
    }

    pub fn result_mut(&mut self) -> Option<&mut QueryResult> {
        self.result.as_mut()
    }

    /// Set the result. During pre-filtering this short-circuits the request.
    pub fn set_result(&mut self, result: QueryResult) {
        self.result = Some(result);
    }

    pub fn take_result(&mut self) -> Option<QueryResult> {
        self.result.take()
    }
}

/// Hook around the whole request
pub trait RequestFilter: Send + Sync {
    fn name(&self) -> &str;

    /// Runs before rewriting
    fn filter_request<'a>(
        &'a self,
        _ctx: &'a mut RequestFilterContext<'_>,
    ) -> BoxFuture<'a, CoreResult<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Runs after execution
    fn filter_result<'a>(
        &'a self,
        _ctx: &'a mut RequestFilterContext<'_>,
    ) -> BoxFuture<'a, CoreResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
