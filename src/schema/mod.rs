//! Schema model for aeroquery
//!
//! The model is the request-bound schema that data references are
//! resolved against. It is built programmatically or loaded from a JSON
//! model document, and is read-only once shared with the pipeline.
//!
//! # Design Principles
//!
//! - Named sources are collections, singletons or composable functions
//! - Every source produces rows of a declared entity type
//! - Navigation targets must be declared
//! - Deterministic lookup

mod errors;
mod loader;
mod model;
mod types;

pub use errors::{SchemaError, SchemaErrorCode, SchemaResult, Severity};
pub use loader::{ModelDocument, SchemaLoader, SourceEntry};
pub use model::{FunctionDef, ParameterDef, SchemaElement, SchemaModel};
pub use types::{EntityType, FieldDef, FieldType};
