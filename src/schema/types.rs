//! Schema type definitions
//!
//! Supported field types:
//! - string, int, bool, float: primitive properties
//! - entity: single-valued navigation to another entity type
//! - collection: multi-valued navigation to another entity type

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::expr::QueryType;

/// Field types of an entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 string
    String,
    /// 64-bit signed integer
    Int,
    /// Boolean
    Bool,
    /// 64-bit floating point
    Float,
    /// Single-valued navigation
    Entity {
        /// Target entity type name
        entity: String,
    },
    /// Multi-valued navigation
    Collection {
        /// Target entity type name
        entity: String,
    },
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Bool => "bool",
            FieldType::Float => "float",
            FieldType::Entity { .. } => "entity",
            FieldType::Collection { .. } => "collection",
        }
    }

    /// Entity type referenced by a navigation field
    pub fn target_entity(&self) -> Option<&str> {
        match self {
            FieldType::Entity { entity } | FieldType::Collection { entity } => Some(entity),
            _ => None,
        }
    }

    /// Static query type of an access to this field
    pub fn query_type(&self) -> QueryType {
        match self {
            FieldType::String => QueryType::String,
            FieldType::Int => QueryType::Int,
            FieldType::Bool => QueryType::Bool,
            FieldType::Float => QueryType::Float,
            FieldType::Entity { entity } => QueryType::entity(entity.clone()),
            FieldType::Collection { entity } => QueryType::sequence(QueryType::entity(entity.clone())),
        }
    }
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field data type
    #[serde(flatten)]
    pub field_type: FieldType,
    /// Whether the field must be present
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    /// Create a required string field
    pub fn required_string() -> Self {
        Self {
            field_type: FieldType::String,
            required: true,
        }
    }

    /// Create an optional string field
    pub fn optional_string() -> Self {
        Self {
            field_type: FieldType::String,
            required: false,
        }
    }

    /// Create a required int field
    pub fn required_int() -> Self {
        Self {
            field_type: FieldType::Int,
            required: true,
        }
    }

    /// Create an optional int field
    pub fn optional_int() -> Self {
        Self {
            field_type: FieldType::Int,
            required: false,
        }
    }

    /// Create a required bool field
    pub fn required_bool() -> Self {
        Self {
            field_type: FieldType::Bool,
            required: true,
        }
    }

    /// Create a required float field
    pub fn required_float() -> Self {
        Self {
            field_type: FieldType::Float,
            required: true,
        }
    }

    /// Single-valued navigation to `entity`
    pub fn navigation(entity: impl Into<String>) -> Self {
        Self {
            field_type: FieldType::Entity {
                entity: entity.into(),
            },
            required: false,
        }
    }

    /// Multi-valued navigation to `entity`
    pub fn navigation_many(entity: impl Into<String>) -> Self {
        Self {
            field_type: FieldType::Collection {
                entity: entity.into(),
            },
            required: false,
        }
    }
}

/// A named structured type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    /// Type name, unique within a model
    pub name: String,
    /// Key fields
    #[serde(default)]
    pub key: Vec<String>,
    /// Field definitions
    pub fields: HashMap<String, FieldDef>,
}

impl EntityType {
    /// Create a new entity type
    pub fn new(name: impl Into<String>, fields: HashMap<String, FieldDef>) -> Self {
        Self {
            name: name.into(),
            key: Vec::new(),
            fields,
        }
    }

    /// Set the key fields
    pub fn with_key(mut self, key: &[&str]) -> Self {
        self.key = key.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Get a field definition
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Validates the type itself (not a document)
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Entity type name must not be empty".into());
        }

        for key in &self.key {
            match self.fields.get(key) {
                None => {
                    return Err(format!(
                        "Key field '{}' is not declared on '{}'",
                        key, self.name
                    ))
                }
                Some(def) if !def.required => {
                    return Err(format!("Key field '{}' must be required", key))
                }
                Some(def) if def.field_type.target_entity().is_some() => {
                    return Err(format!("Key field '{}' must be primitive", key))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}
