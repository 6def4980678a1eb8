//! # Query Tree Rewriting
//!
//! Turns a name-addressed query tree into one fully sourced, backend
//! executable tree.
//!
//! ## Design Principles
//!
//! - Static result types are preserved by every rewrite
//! - Hooks are registered once and shared read-only
//! - Re-entrant filter passes never revisit the node they wrap
//! - The first sourced reference is the root; later ones are embedded in it

mod context;
mod engine;
mod errors;
mod hooks;

pub use context::{Frame, RewriteContext, DEFAULT_MAX_DEPTH};
pub use engine::RewriteEngine;
pub use errors::{RewriteError, RewriteResult};
pub use hooks::{
    Expander, Filter, HookRegistry, HookRegistryBuilder, Inspector, Normalizer, SourceMode,
    Sourcer,
};
