//! # Convention Hooks
//!
//! Ready-made hooks for the common rewrite needs:
//!
//! - `MemberAccessNormalizer`: `api.Customers` → data reference
//! - `ReadAuthorizer`: per-collection read policy
//! - `ViewExpander`: named sources defined as queries over other sources
//! - `CollectionFilter`: per-collection row predicates
//! - `RowSecurityFilter`: ownership-based row-level security
//!
//! All of them act on data references only and leave every other node
//! untouched.

mod authorize;
mod normalize;
mod row_filter;
mod views;

pub use authorize::{AccessPolicy, ReadAuthorizer};
pub use normalize::MemberAccessNormalizer;
pub use row_filter::{CollectionFilter, RowSecurityFilter, DEFAULT_OWNER_FIELD};
pub use views::ViewExpander;

use crate::binding::DataReference;
use crate::rewrite::RewriteContext;

/// Name of the lambda parameter in generated predicates
pub(crate) const ITEM: &str = "it";

/// The data reference under visit with the collection it reads from.
///
/// Falls back to the element name when the schema has no unique owning
/// collection.
pub(crate) fn referenced_collection<'c>(
    ctx: &'c RewriteContext<'_>,
) -> Option<(&'c DataReference, String)> {
    let reference = ctx.binding().as_data_reference()?;
    let collection = ctx
        .binding()
        .owning_collection(ctx.model())
        .unwrap_or_else(|| reference.name.clone());
    Some((reference, collection))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the convention tests

    use std::collections::HashMap;

    use serde_json::json;

    use crate::schema::{EntityType, FieldDef, SchemaModel};

    pub fn model() -> SchemaModel {
        let mut customer = HashMap::new();
        customer.insert("Id".to_string(), FieldDef::required_int());
        customer.insert("Status".to_string(), FieldDef::required_string());
        customer.insert("owner_id".to_string(), FieldDef::optional_string());

        let mut order = HashMap::new();
        order.insert("Id".to_string(), FieldDef::required_int());
        order.insert("Total".to_string(), FieldDef::required_int());

        SchemaModel::new("Sales")
            .with_entity_type(EntityType::new("Customer", customer).with_key(&["Id"]))
            .and_then(|m| m.with_entity_type(EntityType::new("Order", order).with_key(&["Id"])))
            .and_then(|m| m.with_collection("Customers", "Customer"))
            .and_then(|m| m.with_collection("Orders", "Order"))
            .and_then(|m| m.with_singleton("Me", "Customer"))
            .unwrap()
    }

    pub fn rows() -> Vec<(&'static str, Vec<serde_json::Value>)> {
        vec![
            (
                "Customers",
                vec![
                    json!({"Id": 1, "Status": "active", "owner_id": "a"}),
                    json!({"Id": 2, "Status": "closed", "owner_id": "b"}),
                ],
            ),
            ("Orders", vec![json!({"Id": 10, "Total": 5})]),
        ]
    }
}
