//! Model binding
//!
//! Classifies a query tree node as schema-level data. A binding is never
//! stored on the node; it is derived from the node's shape, the schema and
//! the enclosing frames (lambda parameters bind through the call that
//! declares them).
//!
//! - `DataReference`: the node is `Source(name, ...)` naming a schema element
//! - `Derived(Property)`: member access on a bound node
//! - `Derived(CollectionElement)`: a lambda parameter ranging over a bound collection

use crate::expr::{Expr, ExprKind, QueryType};
use crate::schema::{SchemaElement, SchemaModel};

/// Data reference binding: a named schema source
#[derive(Debug, Clone, PartialEq)]
pub struct DataReference {
    pub namespace: Option<String>,
    pub name: String,
    pub args: Vec<Expr>,
    pub element: SchemaElement,
}

impl DataReference {
    /// Static type of the referenced element
    pub fn logical_type(&self) -> QueryType {
        self.element.logical_type()
    }
}

/// How a derived binding relates to its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedKind {
    Property(String),
    CollectionElement,
}

/// Binding computed from another binding
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedReference {
    pub source: Box<ModelBinding>,
    pub kind: DerivedKind,
    logical_type: QueryType,
}

impl DerivedReference {
    pub fn logical_type(&self) -> &QueryType {
        &self.logical_type
    }
}

/// Schema classification of a node
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ModelBinding {
    #[default]
    None,
    DataReference(DataReference),
    Derived(DerivedReference),
}

/// Binding failure: the node names a source the schema does not declare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSource(pub String);

impl ModelBinding {
    pub fn is_none(&self) -> bool {
        matches!(self, ModelBinding::None)
    }

    pub fn is_data_reference(&self) -> bool {
        matches!(self, ModelBinding::DataReference(_))
    }

    pub fn as_data_reference(&self) -> Option<&DataReference> {
        match self {
            ModelBinding::DataReference(r) => Some(r),
            _ => None,
        }
    }

    /// Logical type of the bound data
    pub fn logical_type(&self) -> Option<QueryType> {
        match self {
            ModelBinding::None => None,
            ModelBinding::DataReference(r) => Some(r.logical_type()),
            ModelBinding::Derived(d) => Some(d.logical_type.clone()),
        }
    }

    /// Logical element type: the element of a collection, or the type itself
    pub fn element_type(&self) -> Option<QueryType> {
        self.logical_type()
            .map(|ty| ty.element_type().cloned().unwrap_or(ty))
    }

    /// The schema collection owning the bound data
    pub fn owning_collection(&self, model: &SchemaModel) -> Option<String> {
        match self {
            ModelBinding::None => None,
            ModelBinding::DataReference(r) => match &r.element {
                SchemaElement::Collection { name, .. } | SchemaElement::Singleton { name, .. } => {
                    Some(name.clone())
                }
                SchemaElement::Function(f) => f
                    .entity_set
                    .clone()
                    .or_else(|| model.owning_collection(&r.logical_type()).map(str::to_string)),
            },
            ModelBinding::Derived(d) => match &d.kind {
                DerivedKind::CollectionElement => d.source.owning_collection(model),
                DerivedKind::Property(_) => {
                    model.owning_collection(&d.logical_type).map(str::to_string)
                }
            },
        }
    }

    /// Derive the binding of `node`.
    ///
    /// `enclosing` lists the nodes of the frames below `node`, outermost
    /// first; it is consulted to bind lambda parameters.
    pub fn bind(
        node: &Expr,
        enclosing: &[&Expr],
        model: &SchemaModel,
    ) -> Result<ModelBinding, UnknownSource> {
        match node.kind() {
            ExprKind::Source(source) => {
                let element = model
                    .resolve(&source.name, source.namespace.as_deref())
                    .ok_or_else(|| UnknownSource(source.qualified_name()))?;
                Ok(ModelBinding::DataReference(DataReference {
                    namespace: source.namespace.clone(),
                    name: source.name.clone(),
                    args: source.args.clone(),
                    element: element.clone(),
                }))
            }
            ExprKind::Member { target, name } => {
                let source = Self::bind(target, enclosing, model)?;
                Ok(Self::property_of(source, name, model))
            }
            ExprKind::Parameter(name) => Self::bind_parameter(name, enclosing, model),
            _ => Ok(ModelBinding::None),
        }
    }

    fn property_of(source: ModelBinding, property: &str, model: &SchemaModel) -> ModelBinding {
        let entity = match source.logical_type() {
            Some(QueryType::Entity(entity)) => entity,
            _ => return ModelBinding::None,
        };
        match model.property_type(&entity, property) {
            Some(logical_type) => ModelBinding::Derived(DerivedReference {
                source: Box::new(source),
                kind: DerivedKind::Property(property.to_string()),
                logical_type,
            }),
            None => ModelBinding::None,
        }
    }

    /// A lambda parameter binds to the element of the collection its
    /// declaring lambda ranges over: the first argument of the call the
    /// lambda is an argument of.
    fn bind_parameter(
        name: &str,
        enclosing: &[&Expr],
        model: &SchemaModel,
    ) -> Result<ModelBinding, UnknownSource> {
        for (depth, frame) in enclosing.iter().enumerate().rev() {
            let declares = matches!(frame.kind(), ExprKind::Lambda { param, .. } if param == name);
            if !declares {
                continue;
            }
            let outer = &enclosing[..depth];
            let call = match outer.last().map(|e| e.kind()) {
                Some(ExprKind::Call { args, .. }) if args.iter().any(|a| a.is_same(frame)) => args,
                _ => return Ok(ModelBinding::None),
            };
            let source = match call.first() {
                Some(source) => Self::bind(source, &outer[..outer.len() - 1], model)?,
                None => return Ok(ModelBinding::None),
            };
            return Ok(match source.logical_type().as_ref().and_then(|t| t.element_type()) {
                Some(element) => ModelBinding::Derived(DerivedReference {
                    logical_type: element.clone(),
                    source: Box::new(source),
                    kind: DerivedKind::CollectionElement,
                }),
                None => ModelBinding::None,
            });
        }
        Ok(ModelBinding::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntityType, FieldDef, FunctionDef};
    use serde_json::json;
    use std::collections::HashMap;

    fn model() -> SchemaModel {
        let mut customer = HashMap::new();
        customer.insert("Id".to_string(), FieldDef::required_int());
        customer.insert("Status".to_string(), FieldDef::required_string());
        customer.insert("Orders".to_string(), FieldDef::navigation_many("Order"));

        let mut order = HashMap::new();
        order.insert("Id".to_string(), FieldDef::required_int());

        SchemaModel::new("Sales")
            .with_entity_type(EntityType::new("Customer", customer))
            .and_then(|m| m.with_entity_type(EntityType::new("Order", order)))
            .and_then(|m| m.with_collection("Customers", "Customer"))
            .and_then(|m| m.with_collection("Orders", "Order"))
            .and_then(|m| m.with_function(FunctionDef::new("Recent", "Order")))
            .unwrap()
    }

    #[test]
    fn test_source_binds_as_data_reference() {
        let model = model();
        let node = model.source_expr("Customers").unwrap();
        let binding = ModelBinding::bind(&node, &[], &model).unwrap();

        assert!(binding.is_data_reference());
        assert_eq!(binding.owning_collection(&model), Some("Customers".to_string()));
        assert_eq!(binding.element_type(), Some(QueryType::entity("Customer")));
    }

    #[test]
    fn test_unknown_source_fails() {
        let model = model();
        let node = Expr::source("Ghosts", QueryType::Any);
        assert_eq!(
            ModelBinding::bind(&node, &[], &model),
            Err(UnknownSource("Ghosts".to_string()))
        );
    }

    #[test]
    fn test_plain_nodes_are_unbound() {
        let model = model();
        let node = Expr::constant(json!(1));
        assert!(ModelBinding::bind(&node, &[], &model).unwrap().is_none());
    }

    #[test]
    fn test_lambda_parameter_binds_to_collection_element() {
        let model = model();
        let it = Expr::parameter("it", QueryType::entity("Customer"));
        let status = Expr::member(it.clone(), "Status", QueryType::String);
        let lambda = Expr::lambda("it", Expr::eq(status.clone(), Expr::constant(json!("a"))));
        let call = model.source_expr("Customers").unwrap().filter(lambda.clone());
        let predicate = match lambda.kind() {
            ExprKind::Lambda { body, .. } => body.clone(),
            _ => unreachable!(),
        };

        let enclosing = [&call, &lambda, &predicate];
        let binding = ModelBinding::bind(&it, &enclosing, &model).unwrap();
        match &binding {
            ModelBinding::Derived(d) => assert_eq!(d.kind, DerivedKind::CollectionElement),
            other => panic!("Expected derived binding, got {:?}", other),
        }
        assert_eq!(binding.owning_collection(&model), Some("Customers".to_string()));

        let property = ModelBinding::bind(&status, &enclosing, &model).unwrap();
        assert_eq!(property.logical_type(), Some(QueryType::String));
        assert_eq!(property.owning_collection(&model), None);
    }

    #[test]
    fn test_navigation_property_owned_by_target_collection() {
        let model = model();
        let it = Expr::parameter("c", QueryType::entity("Customer"));
        let orders = Expr::member(it.clone(), "Orders", QueryType::sequence(QueryType::entity("Order")));
        let lambda = Expr::lambda("c", orders.clone());
        let call = model.source_expr("Customers").unwrap().select(lambda.clone());

        let binding = ModelBinding::bind(&orders, &[&call, &lambda], &model).unwrap();
        assert_eq!(binding.owning_collection(&model), Some("Orders".to_string()));
    }

    #[test]
    fn test_free_parameter_is_unbound() {
        let model = model();
        let api = Expr::parameter("api", QueryType::Any);
        assert!(ModelBinding::bind(&api, &[], &model).unwrap().is_none());
    }

    #[test]
    fn test_function_owning_collection_by_type() {
        let model = model();
        let node = model.function_expr(None, "Recent", vec![]).unwrap();
        let binding = ModelBinding::bind(&node, &[], &model).unwrap();
        assert_eq!(binding.owning_collection(&model), Some("Orders".to_string()));
    }
}
