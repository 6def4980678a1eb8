//! aeroquery - query tree rewriting over schema models
//!
//! A query arrives as a typed tree referring to schema-level sources.
//! The rewrite engine walks it bottom-up through pluggable hooks
//! (normalize, inspect, expand, filter) and finally sources every data
//! reference into a backend-native fragment, which a backend executes.

pub mod backend;
pub mod binding;
pub mod cli;
pub mod config;
pub mod conventions;
pub mod core;
pub mod expr;
pub mod observability;
pub mod rewrite;
pub mod schema;
