//! Schema error types
//!
//! Error codes:
//! - AERO_SCHEMA_MALFORMED (FATAL at load time)
//! - AERO_SCHEMA_DUPLICATE_ELEMENT (FATAL at load time)
//! - AERO_UNKNOWN_ENTITY_TYPE (REJECT)
//! - AERO_UNKNOWN_SOURCE (REJECT)
//! - AERO_UNKNOWN_PROPERTY (REJECT)

use std::fmt;

/// Severity levels for schema errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Client request rejected
    Reject,
    /// The model cannot be used
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Model document or type structure is invalid
    AeroSchemaMalformed,
    /// Two elements share a name
    AeroSchemaDuplicateElement,
    /// Entity type not declared
    AeroUnknownEntityType,
    /// Collection, singleton or function not declared
    AeroUnknownSource,
    /// Property not declared on the entity type
    AeroUnknownProperty,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::AeroSchemaMalformed => "AERO_SCHEMA_MALFORMED",
            SchemaErrorCode::AeroSchemaDuplicateElement => "AERO_SCHEMA_DUPLICATE_ELEMENT",
            SchemaErrorCode::AeroUnknownEntityType => "AERO_UNKNOWN_ENTITY_TYPE",
            SchemaErrorCode::AeroUnknownSource => "AERO_UNKNOWN_SOURCE",
            SchemaErrorCode::AeroUnknownProperty => "AERO_UNKNOWN_PROPERTY",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            SchemaErrorCode::AeroSchemaMalformed | SchemaErrorCode::AeroSchemaDuplicateElement => {
                Severity::Fatal
            }
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema error type with context
#[derive(Debug, Clone)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    /// Offending element, type or property name
    subject: Option<String>,
}

impl SchemaError {
    /// Malformed model document or type
    pub fn malformed(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::AeroSchemaMalformed,
            message: format!("Malformed model '{}': {}", origin.into(), reason.into()),
            subject: None,
        }
    }

    /// Duplicate element name
    pub fn duplicate_element(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: SchemaErrorCode::AeroSchemaDuplicateElement,
            message: format!("Element '{}' is declared more than once", name),
            subject: Some(name),
        }
    }

    /// Unknown entity type
    pub fn unknown_entity_type(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: SchemaErrorCode::AeroUnknownEntityType,
            message: format!("Entity type '{}' not found", name),
            subject: Some(name),
        }
    }

    /// Unknown collection, singleton or function
    pub fn unknown_source(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: SchemaErrorCode::AeroUnknownSource,
            message: format!("Source '{}' not found", name),
            subject: Some(name),
        }
    }

    /// Unknown property on an entity type
    pub fn unknown_property(entity: &str, property: impl Into<String>) -> Self {
        let property = property.into();
        Self {
            code: SchemaErrorCode::AeroUnknownProperty,
            message: format!("Property '{}' not found on '{}'", property, entity),
            subject: Some(property),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the offending name if applicable
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
