//! Schema loader for model documents on disk
//!
//! A model document is a single JSON object:
//!
//! ```json
//! {
//!   "namespace": "Sales",
//!   "entity_types": [{"name": "Customer", "key": ["Id"], "fields": {"Id": {"type": "int", "required": true}}}],
//!   "collections": [{"name": "Customers", "entity_type": "Customer"}],
//!   "singletons": [],
//!   "functions": []
//! }
//! ```
//!
//! Malformed documents are rejected as a whole; no partial model is returned.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{SchemaError, SchemaResult};
use super::model::{FunctionDef, SchemaElement, SchemaModel};
use super::types::EntityType;

/// Named source entry in a model document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    pub entity_type: String,
}

/// On-disk model document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDocument {
    pub namespace: String,
    #[serde(default)]
    pub entity_types: Vec<EntityType>,
    #[serde(default)]
    pub collections: Vec<SourceEntry>,
    #[serde(default)]
    pub singletons: Vec<SourceEntry>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
}

impl ModelDocument {
    /// Build and validate the model.
    ///
    /// Collections are registered before functions so that a function's
    /// `entity_set` may name any collection in the document.
    pub fn into_model(self) -> SchemaResult<SchemaModel> {
        let mut model = SchemaModel::new(self.namespace);

        for ty in self.entity_types {
            model.add_entity_type(ty)?;
        }
        for c in self.collections {
            model.add_element(SchemaElement::Collection {
                name: c.name,
                entity_type: c.entity_type,
            })?;
        }
        for s in self.singletons {
            model.add_element(SchemaElement::Singleton {
                name: s.name,
                entity_type: s.entity_type,
            })?;
        }
        for f in self.functions {
            model.add_element(SchemaElement::Function(f))?;
        }

        model.validate()?;
        Ok(model)
    }
}

/// Loads schema models from JSON
pub struct SchemaLoader;

impl SchemaLoader {
    /// Loads a model document from a file
    pub fn load_file(path: &Path) -> SchemaResult<SchemaModel> {
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::malformed(path.display().to_string(), format!("Failed to read file: {}", e))
        })?;

        Self::load_str(&content).map_err(|e| match e.code() {
            super::SchemaErrorCode::AeroSchemaMalformed => {
                SchemaError::malformed(path.display().to_string(), e.message())
            }
            _ => e,
        })
    }

    /// Loads a model document from a JSON string
    pub fn load_str(content: &str) -> SchemaResult<SchemaModel> {
        let document: ModelDocument = serde_json::from_str(content)
            .map_err(|e| SchemaError::malformed("<inline>", format!("Invalid JSON: {}", e)))?;

        document.into_model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::QueryType;
    use crate::schema::SchemaErrorCode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SALES: &str = r#"{
        "namespace": "Sales",
        "entity_types": [
            {"name": "Customer", "key": ["Id"], "fields": {
                "Id": {"type": "int", "required": true},
                "Status": {"type": "string", "required": true},
                "Orders": {"type": "collection", "entity": "Order"}
            }},
            {"name": "Order", "key": ["Id"], "fields": {
                "Id": {"type": "int", "required": true},
                "Total": {"type": "float", "required": true}
            }}
        ],
        "collections": [
            {"name": "Customers", "entity_type": "Customer"},
            {"name": "Orders", "entity_type": "Order"}
        ],
        "singletons": [{"name": "Me", "entity_type": "Customer"}],
        "functions": [{"name": "TopOrders", "returns": "Order", "entity_set": "Orders",
                       "parameters": [{"name": "n", "type": {"type": "int"}}]}]
    }"#;

    #[test]
    fn test_load_str() {
        let model = SchemaLoader::load_str(SALES).unwrap();

        assert_eq!(model.namespace(), "Sales");
        assert_eq!(model.elements().count(), 4);
        assert_eq!(
            model.property_type("Order", "Total"),
            Some(QueryType::Float)
        );
    }

    #[test]
    fn test_function_parameters_parsed() {
        let model = SchemaLoader::load_str(SALES).unwrap();
        match model.resolve("TopOrders", None) {
            Some(SchemaElement::Function(f)) => {
                assert_eq!(f.parameters.len(), 1);
                assert_eq!(f.parameters[0].ty, QueryType::Int);
                assert!(f.returns_collection);
            }
            other => panic!("Expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SALES.as_bytes()).unwrap();

        let model = SchemaLoader::load_file(file.path()).unwrap();
        assert!(model.resolve("Customers", None).is_some());
    }

    #[test]
    fn test_invalid_json_rejected() {
        let err = SchemaLoader::load_str("{ not json").unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::AeroSchemaMalformed);
    }

    #[test]
    fn test_dangling_navigation_rejected() {
        let doc = r#"{
            "namespace": "Sales",
            "entity_types": [{"name": "Customer", "fields": {
                "Invoices": {"type": "collection", "entity": "Invoice"}
            }}]
        }"#;
        let err = SchemaLoader::load_str(doc).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::AeroUnknownEntityType);
    }

    #[test]
    fn test_missing_file_is_malformed() {
        let err = SchemaLoader::load_file(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(err.is_fatal());
    }
}
