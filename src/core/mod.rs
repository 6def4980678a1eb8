//! # Query Pipeline Core
//!
//! Request-level plumbing around the rewrite engine: request context,
//! request filters, the executor contract and the pipeline driving a
//! query from submission to result.
//!
//! ## Design Principles
//!
//! - One request lifecycle with explicit states
//! - Rewriting is synchronous; only filters and execution await
//! - Cancellation is observed at every stage boundary

pub mod context;
pub mod error;
pub mod executor;
pub mod filters;
pub mod operation;
pub mod pipeline;
pub mod result;
pub mod state;

pub use context::{AuthContext, RequestContext};
pub use error::{CoreError, CoreResult};
pub use executor::{dispatch, BoxFuture, ExecutionOptions, QueryExecutor, SequenceOutput};
pub use filters::{RequestFilter, RequestFilterContext};
pub use operation::{CompareOp, OrderKey, Predicate, QuerySpec};
pub use pipeline::{QueryPipeline, QueryPipelineBuilder, QueryRequest, RewriteOutcome};
pub use result::{QueryResult, ResultShape};
pub use state::{RequestLifecycle, RequestState};
