use async_graphql::parser::types::TypeKind;
use serde::Serialize;

use super::model::ValidatedSchema;

/// An object type and its field names, in SDL declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSummary {
    pub type_name: String,
    pub fields: Vec<String>,
}

/// Lists user-defined object types in the order the SDL declared them.
pub fn summarize(schema: &ValidatedSchema) -> Vec<TypeSummary> {
    schema
        .model()
        .types
        .values()
        .filter(|ty| matches!(ty.kind, TypeKind::Object(_)) && !ty.name.starts_with("__"))
        .map(|ty| TypeSummary {
            type_name: ty.name.clone(),
            fields: ty
                .fields()
                .iter()
                .map(|field| field.node.name.node.to_string())
                .collect(),
        })
        .collect()
}
