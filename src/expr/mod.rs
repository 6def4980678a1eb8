//! Query tree
//!
//! Immutable, shareable nodes with a static result type and an explicit
//! identity. Data references (`ExprKind::Source`) are the name-addressed
//! leaves the rewrite engine resolves; native fragments
//! (`ExprKind::Native`) are what a backend executes.

mod display;
mod node;
mod types;

pub use node::{
    BinaryOp, Constant, Expr, ExprKind, NativeQueryable, NativeSource, NodeId, ProxyId,
    QueryMethod, SourceRef,
};
pub use types::QueryType;
