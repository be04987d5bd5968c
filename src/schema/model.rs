//! The built schema: a type map that keeps SDL declaration order and positions.

use std::fmt;
use std::sync::Arc;

use async_graphql::parser::Positioned;
use async_graphql::parser::types::{
    ConstDirective, DirectiveDefinition, FieldDefinition, InputValueDefinition, ServiceDocument,
    TypeDefinition, TypeKind, TypeSystemDefinition,
};
use async_graphql::parser::Pos;
use indexmap::IndexMap;

/// Scalars every schema gets without declaring them.
pub const BUILTIN_SCALARS: &[&str] = &["String", "Int", "Float", "Boolean", "ID"];

pub fn is_builtin_scalar(name: &str) -> bool {
    BUILTIN_SCALARS.contains(&name)
}

/// A named type after its extensions were merged in.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub pos: Pos,
    pub description: Option<String>,
    pub directives: Vec<Positioned<ConstDirective>>,
    pub kind: TypeKind,
}

impl TypeDef {
    pub fn is_input_type(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Scalar | TypeKind::Enum(_) | TypeKind::InputObject(_)
        )
    }

    pub fn is_output_type(&self) -> bool {
        !matches!(self.kind, TypeKind::InputObject(_))
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, TypeKind::Interface(_) | TypeKind::Union(_))
    }

    /// Output fields of objects and interfaces, in declaration order.
    pub fn fields(&self) -> &[Positioned<FieldDefinition>] {
        match &self.kind {
            TypeKind::Object(obj) => &obj.fields,
            TypeKind::Interface(iface) => &iface.fields,
            _ => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields()
            .iter()
            .map(|f| &f.node)
            .find(|f| f.name.node == name)
    }

    pub fn implements(&self) -> &[Positioned<async_graphql::Name>] {
        match &self.kind {
            TypeKind::Object(obj) => &obj.implements,
            TypeKind::Interface(iface) => &iface.implements,
            _ => &[],
        }
    }

    pub fn input_fields(&self) -> &[Positioned<InputValueDefinition>] {
        match &self.kind {
            TypeKind::InputObject(input) => &input.fields,
            _ => &[],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        kind_name(&self.kind)
    }
}

pub(crate) fn kind_name(kind: &TypeKind) -> &'static str {
    match kind {
        TypeKind::Scalar => "scalar",
        TypeKind::Object(_) => "object",
        TypeKind::Interface(_) => "interface",
        TypeKind::Union(_) => "union",
        TypeKind::Enum(_) => "enum",
        TypeKind::InputObject(_) => "input object",
    }
}

/// Root operation types declared by `schema { ... }` and `extend schema`.
#[derive(Debug, Clone, Default)]
pub struct SchemaRoots {
    /// Position of the `schema` definition; extensions never set it.
    pub pos: Option<Pos>,
    pub directives: Vec<Positioned<ConstDirective>>,
    pub query: Option<Positioned<String>>,
    pub mutation: Option<Positioned<String>>,
    pub subscription: Option<Positioned<String>>,
}

#[derive(Debug, Default)]
pub struct SchemaModel {
    pub types: IndexMap<String, TypeDef>,
    pub directives: IndexMap<String, Positioned<DirectiveDefinition>>,
    pub roots: SchemaRoots,
}

impl SchemaModel {
    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Whether a type name resolves at all (declared or built in).
    pub fn resolves(&self, name: &str) -> bool {
        is_builtin_scalar(name) || self.types.contains_key(name)
    }

    pub fn is_input_type(&self, name: &str) -> bool {
        is_builtin_scalar(name) || self.get(name).is_some_and(TypeDef::is_input_type)
    }

    pub fn query_type(&self) -> Option<&str> {
        self.root_name(&self.roots.query, "Query")
    }

    pub fn mutation_type(&self) -> Option<&str> {
        self.root_name(&self.roots.mutation, "Mutation")
    }

    pub fn subscription_type(&self) -> Option<&str> {
        self.root_name(&self.roots.subscription, "Subscription")
    }

    /// Declared roots win. Without a schema definition, an operation no
    /// extension declares falls back to the conventional type name if such
    /// a type exists.
    fn root_name<'a>(&'a self, declared: &'a Option<Positioned<String>>, default: &'a str) -> Option<&'a str> {
        match (declared, self.roots.pos) {
            (Some(name), _) => Some(name.node.as_str()),
            (None, Some(_)) => None,
            (None, None) => self.types.contains_key(default).then_some(default),
        }
    }

    /// True when `sub` is `sup` or a member/implementer of the abstract `sup`.
    pub fn is_possible_type(&self, sup: &str, sub: &str) -> bool {
        if sup == sub {
            return true;
        }
        match self.get(sup).map(|t| &t.kind) {
            Some(TypeKind::Union(union)) => union.members.iter().any(|m| m.node == sub),
            Some(TypeKind::Interface(_)) => self
                .get(sub)
                .is_some_and(|t| t.implements().iter().any(|i| i.node == sup)),
            _ => false,
        }
    }
}

/// Opaque handle to a schema that passed every validation stage.
#[derive(Clone)]
pub struct ValidatedSchema {
    model: Arc<SchemaModel>,
}

impl ValidatedSchema {
    pub(crate) fn new(model: SchemaModel) -> Self {
        Self {
            model: Arc::new(model),
        }
    }

    pub(crate) fn model(&self) -> &SchemaModel {
        &self.model
    }

    pub fn query_type(&self) -> &str {
        // a schema without query root never validates
        self.model.query_type().unwrap_or("Query")
    }

    pub fn mutation_type(&self) -> Option<&str> {
        self.model.mutation_type()
    }

    pub fn subscription_type(&self) -> Option<&str> {
        self.model.subscription_type()
    }
}

impl fmt::Debug for ValidatedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedSchema")
            .field("types", &self.model.types.len())
            .field("query", &self.model.query_type())
            .finish_non_exhaustive()
    }
}

/// Build failures mean an earlier stage let an invalid document through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildError(pub String);

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Converts a structurally valid document into a [`SchemaModel`].
///
/// Extensions are merged into their base definition: fields, values,
/// members and interfaces are appended after the base ones, so the
/// resulting order is the order a reader meets them in the document.
pub(crate) fn build(document: &ServiceDocument) -> Result<SchemaModel, BuildError> {
    let mut model = SchemaModel::default();
    let mut extensions = Vec::new();

    for definition in &document.definitions {
        match definition {
            TypeSystemDefinition::Schema(schema) => {
                if !schema.node.extend {
                    if model.roots.pos.is_some() {
                        return Err(BuildError("schema defined more than once".to_string()));
                    }
                    model.roots.pos = Some(schema.pos);
                }
                merge_schema(&mut model.roots, &schema.node);
            }
            TypeSystemDefinition::Type(ty) if ty.node.extend => extensions.push(ty),
            TypeSystemDefinition::Type(ty) => {
                let name = ty.node.name.node.to_string();
                if model.types.contains_key(&name) {
                    return Err(BuildError(format!("type {} defined more than once", name)));
                }
                model.types.insert(name.clone(), type_def(name, ty));
            }
            TypeSystemDefinition::Directive(directive) => {
                let name = directive.node.name.node.to_string();
                if model.directives.insert(name.clone(), directive.clone()).is_some() {
                    return Err(BuildError(format!("directive @{} defined more than once", name)));
                }
            }
        }
    }

    for ext in extensions {
        let name = ext.node.name.node.as_str();
        let Some(base) = model.types.get_mut(name) else {
            return Err(BuildError(format!("extension of undefined type {}", name)));
        };
        merge_extension(base, &ext.node)?;
    }

    Ok(model)
}

fn type_def(name: String, ty: &Positioned<TypeDefinition>) -> TypeDef {
    TypeDef {
        name,
        pos: ty.pos,
        description: ty.node.description.as_ref().map(|d| d.node.clone()),
        directives: ty.node.directives.clone(),
        kind: ty.node.kind.clone(),
    }
}

fn merge_schema(roots: &mut SchemaRoots, schema: &async_graphql::parser::types::SchemaDefinition) {
    let to_string = |name: &Positioned<async_graphql::Name>| Positioned::new(name.node.to_string(), name.pos);
    if let Some(query) = &schema.query {
        roots.query = Some(to_string(query));
    }
    if let Some(mutation) = &schema.mutation {
        roots.mutation = Some(to_string(mutation));
    }
    if let Some(subscription) = &schema.subscription {
        roots.subscription = Some(to_string(subscription));
    }
    roots.directives.extend(schema.directives.iter().cloned());
}

fn merge_extension(base: &mut TypeDef, ext: &TypeDefinition) -> Result<(), BuildError> {
    base.directives.extend(ext.directives.iter().cloned());

    match (&mut base.kind, &ext.kind) {
        (TypeKind::Scalar, TypeKind::Scalar) => {}
        (TypeKind::Object(base), TypeKind::Object(ext)) => {
            base.implements.extend(ext.implements.iter().cloned());
            base.fields.extend(ext.fields.iter().cloned());
        }
        (TypeKind::Interface(base), TypeKind::Interface(ext)) => {
            base.implements.extend(ext.implements.iter().cloned());
            base.fields.extend(ext.fields.iter().cloned());
        }
        (TypeKind::Union(base), TypeKind::Union(ext)) => {
            base.members.extend(ext.members.iter().cloned());
        }
        (TypeKind::Enum(base), TypeKind::Enum(ext)) => {
            base.values.extend(ext.values.iter().cloned());
        }
        (TypeKind::InputObject(base), TypeKind::InputObject(ext)) => {
            base.fields.extend(ext.fields.iter().cloned());
        }
        (base_kind, ext_kind) => {
            return Err(BuildError(format!(
                "cannot extend {} {} as {}",
                kind_name(base_kind),
                base.name,
                kind_name(ext_kind)
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::parser::parse_schema;

    fn build_sdl(sdl: &str) -> SchemaModel {
        build(&parse_schema(sdl).unwrap()).unwrap()
    }

    #[test]
    fn test_build_keeps_document_order() {
        let model = build_sdl("type B { x: Int } type A { y: Int } type Query { a: A }");
        let names: Vec<_> = model.types.keys().map(String::as_str).collect();
        assert_eq!(names, ["B", "A", "Query"]);
    }

    #[test]
    fn test_build_merges_extensions() {
        let model = build_sdl(
            "type Query { a: Int }\nextend type Query { b: Int }\nenum E { X }\nextend enum E { Y }",
        );
        let query = model.get("Query").unwrap();
        let fields: Vec<_> = query.fields().iter().map(|f| f.node.name.node.as_str()).collect();
        assert_eq!(fields, ["a", "b"]);
        match &model.get("E").unwrap().kind {
            TypeKind::Enum(e) => assert_eq!(e.values.len(), 2),
            other => panic!("unexpected kind {}", kind_name(other)),
        }
    }

    #[test]
    fn test_build_rejects_unvalidated_duplicates() {
        let doc = parse_schema("type A { x: Int } type A { y: Int }").unwrap();
        assert!(build(&doc).is_err());
    }

    #[test]
    fn test_root_names() {
        let model = build_sdl("type Query { a: Int } type Subscription { s: Int }");
        assert_eq!(model.query_type(), Some("Query"));
        assert_eq!(model.mutation_type(), None);
        assert_eq!(model.subscription_type(), Some("Subscription"));

        let model = build_sdl("schema { query: Root } type Root { a: Int } type Query { b: Int }");
        assert_eq!(model.query_type(), Some("Root"));
    }

    #[test]
    fn test_schema_extension_before_definition() {
        let model = build_sdl(
            "extend schema { mutation: Mutation }\n\
             schema { query: Query }\n\
             type Query { a: Int } type Mutation { b: Int } type Subscription { c: Int }",
        );
        assert!(model.roots.pos.is_some());
        assert_eq!(model.query_type(), Some("Query"));
        assert_eq!(model.mutation_type(), Some("Mutation"));
        // a schema definition turns the conventional names off
        assert_eq!(model.subscription_type(), None);
    }

    #[test]
    fn test_schema_extension_alone_keeps_conventional_roots() {
        let model = build_sdl(
            "directive @d on SCHEMA\n\
             type Query { a: Int } type Sub { s: Int }\n\
             extend schema @d { subscription: Sub }",
        );
        assert!(model.roots.pos.is_none());
        assert_eq!(model.roots.directives.len(), 1);
        assert_eq!(model.query_type(), Some("Query"));
        assert_eq!(model.subscription_type(), Some("Sub"));
    }
}
