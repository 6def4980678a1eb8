//! # Memory Backend
//!
//! Reference backend holding JSON rows in memory. It provides the sourcer
//! turning data references into native fragments and the executor that
//! interprets sourced trees.

mod eval;
mod memory;

pub use eval::{compare_values, Evaluator};
pub use memory::{MemoryExecutor, MemoryQueryable, MemorySourcer, MemoryStore};
