//! Schema model: named sources and their types
//!
//! The model answers the two lookups the rewrite engine needs:
//! - name (optionally namespace-qualified) → collection, singleton or function
//! - logical type → owning collection

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::expr::{Expr, QueryType, SourceRef};

use super::errors::{SchemaError, SchemaResult};
use super::types::EntityType;

/// Declared parameter of a composable function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: QueryType,
}

/// Composable function returning entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    /// Entity type of the returned rows
    pub returns: String,
    /// Whether a collection (rather than a single entity) is returned
    #[serde(default = "default_true")]
    pub returns_collection: bool,
    /// Collection the returned rows belong to, if fixed
    #[serde(default)]
    pub entity_set: Option<String>,
}

fn default_true() -> bool {
    true
}

impl FunctionDef {
    /// A collection-valued function without parameters
    pub fn new(name: impl Into<String>, returns: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            parameters: Vec::new(),
            returns: returns.into(),
            returns_collection: true,
            entity_set: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, ty: QueryType) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn with_entity_set(mut self, collection: impl Into<String>) -> Self {
        self.entity_set = Some(collection.into());
        self
    }
}

/// A named source in the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaElement {
    Collection { name: String, entity_type: String },
    Singleton { name: String, entity_type: String },
    Function(FunctionDef),
}

impl SchemaElement {
    pub fn name(&self) -> &str {
        match self {
            SchemaElement::Collection { name, .. } | SchemaElement::Singleton { name, .. } => name,
            SchemaElement::Function(f) => &f.name,
        }
    }

    /// Entity type of the rows this element produces
    pub fn entity_type(&self) -> &str {
        match self {
            SchemaElement::Collection { entity_type, .. }
            | SchemaElement::Singleton { entity_type, .. } => entity_type,
            SchemaElement::Function(f) => &f.returns,
        }
    }

    /// Static type of a data reference to this element
    pub fn logical_type(&self) -> QueryType {
        let entity = QueryType::entity(self.entity_type());
        match self {
            SchemaElement::Collection { .. } => QueryType::queryable(entity),
            SchemaElement::Singleton { .. } => entity,
            SchemaElement::Function(f) if f.returns_collection => QueryType::queryable(entity),
            SchemaElement::Function(_) => entity,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            SchemaElement::Collection { .. } => "collection",
            SchemaElement::Singleton { .. } => "singleton",
            SchemaElement::Function(_) => "function",
        }
    }
}

/// The schema a request is bound to
#[derive(Debug, Clone, Default)]
pub struct SchemaModel {
    namespace: String,
    entity_types: BTreeMap<String, EntityType>,
    elements: BTreeMap<String, SchemaElement>,
}

impl SchemaModel {
    /// Create an empty model in `namespace`
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entity_types: BTreeMap::new(),
            elements: BTreeMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Register an entity type
    pub fn add_entity_type(&mut self, ty: EntityType) -> SchemaResult<()> {
        ty.validate_structure()
            .map_err(|e| SchemaError::malformed(&ty.name, e))?;
        if self.entity_types.contains_key(&ty.name) {
            return Err(SchemaError::duplicate_element(&ty.name));
        }
        self.entity_types.insert(ty.name.clone(), ty);
        Ok(())
    }

    /// Register a named source
    pub fn add_element(&mut self, element: SchemaElement) -> SchemaResult<()> {
        if !self.entity_types.contains_key(element.entity_type()) {
            return Err(SchemaError::unknown_entity_type(element.entity_type()));
        }
        if let SchemaElement::Function(FunctionDef {
            entity_set: Some(set),
            ..
        }) = &element
        {
            if !matches!(self.elements.get(set), Some(SchemaElement::Collection { .. })) {
                return Err(SchemaError::unknown_source(set));
            }
        }
        if self.elements.contains_key(element.name()) {
            return Err(SchemaError::duplicate_element(element.name()));
        }
        self.elements.insert(element.name().to_string(), element);
        Ok(())
    }

    /// Builder form of `add_entity_type`
    pub fn with_entity_type(mut self, ty: EntityType) -> SchemaResult<Self> {
        self.add_entity_type(ty)?;
        Ok(self)
    }

    /// Builder: declare a collection of `entity_type`
    pub fn with_collection(mut self, name: &str, entity_type: &str) -> SchemaResult<Self> {
        self.add_element(SchemaElement::Collection {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
        })?;
        Ok(self)
    }

    /// Builder: declare a singleton of `entity_type`
    pub fn with_singleton(mut self, name: &str, entity_type: &str) -> SchemaResult<Self> {
        self.add_element(SchemaElement::Singleton {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
        })?;
        Ok(self)
    }

    /// Builder: declare a composable function
    pub fn with_function(mut self, function: FunctionDef) -> SchemaResult<Self> {
        self.add_element(SchemaElement::Function(function))?;
        Ok(self)
    }

    /// Verifies navigation targets after all types are registered
    pub fn validate(&self) -> SchemaResult<()> {
        for ty in self.entity_types.values() {
            for def in ty.fields.values() {
                if let Some(target) = def.field_type.target_entity() {
                    if !self.entity_types.contains_key(target) {
                        return Err(SchemaError::unknown_entity_type(target));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_types.get(name)
    }

    pub fn elements(&self) -> impl Iterator<Item = &SchemaElement> {
        self.elements.values()
    }

    /// Look up a named source.
    ///
    /// A namespace, when given, must match the element's own namespace
    /// (functions) or the model namespace.
    pub fn resolve(&self, name: &str, namespace: Option<&str>) -> Option<&SchemaElement> {
        let element = self.elements.get(name)?;
        match namespace {
            None => Some(element),
            Some(ns) => {
                let own = match element {
                    SchemaElement::Function(f) => f.namespace.as_deref().unwrap_or(&self.namespace),
                    _ => &self.namespace,
                };
                (own == ns).then_some(element)
            }
        }
    }

    /// Static type of `property` on `entity`
    pub fn property_type(&self, entity: &str, property: &str) -> Option<QueryType> {
        self.entity_types
            .get(entity)?
            .field(property)
            .map(|def| def.field_type.query_type())
    }

    /// The collection owning values of `ty`.
    ///
    /// Collection types resolve through their element type. Returns `None`
    /// when no collection, or more than one, holds the entity type.
    pub fn owning_collection(&self, ty: &QueryType) -> Option<&str> {
        let entity = ty.element_type().unwrap_or(ty).entity_name()?;
        let mut owners = self.elements.values().filter_map(|e| match e {
            SchemaElement::Collection { name, entity_type } if entity_type == entity => {
                Some(name.as_str())
            }
            _ => None,
        });
        let first = owners.next()?;
        owners.next().is_none().then_some(first)
    }

    /// Typed data reference to `name`
    pub fn source_expr(&self, name: &str) -> SchemaResult<Expr> {
        let element = self
            .resolve(name, None)
            .ok_or_else(|| SchemaError::unknown_source(name))?;
        Ok(Expr::source(name, element.logical_type()))
    }

    /// Typed data reference to a composable function call
    pub fn function_expr(
        &self,
        namespace: Option<&str>,
        name: &str,
        args: Vec<Expr>,
    ) -> SchemaResult<Expr> {
        let element = self
            .resolve(name, namespace)
            .ok_or_else(|| SchemaError::unknown_source(name))?;
        Ok(Expr::source_ref(
            SourceRef {
                namespace: namespace.map(str::to_string),
                name: name.to_string(),
                args,
            },
            element.logical_type(),
        ))
    }

    /// Typed access to `property` on an entity-typed `target`
    pub fn property(&self, target: Expr, property: &str) -> SchemaResult<Expr> {
        let entity = target
            .ty()
            .entity_name()
            .ok_or_else(|| SchemaError::unknown_entity_type(target.ty().to_string()))?
            .to_string();
        let ty = self
            .property_type(&entity, property)
            .ok_or_else(|| SchemaError::unknown_property(&entity, property))?;
        Ok(Expr::member(target, property, ty))
    }
}
