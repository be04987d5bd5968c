//! Semantic checks that need the whole type map.

use std::collections::{HashMap, HashSet};

use async_graphql::Value as ConstValue;
use async_graphql::parser::types::{
    BaseType, ConstDirective, DirectiveDefinition, FieldDefinition, InputValueDefinition, Type,
    TypeKind,
};
use async_graphql::parser::{Pos, Positioned};

use super::diagnostic::{Diagnostic, sort_by_location};
use super::model::{SchemaModel, TypeDef, is_builtin_scalar};
use super::sdl_rules::builtin_directives;

struct SemanticContext<'a> {
    model: &'a SchemaModel,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> SemanticContext<'a> {
    fn push(&mut self, message: impl Into<String>, pos: Option<Pos>) {
        self.diagnostics.push(Diagnostic::semantic(message, pos));
    }

    fn directive(&self, name: &str) -> Option<&'a DirectiveDefinition> {
        self.model
            .directives
            .get(name)
            .or_else(|| builtin_directives().iter().find(|d| d.node.name.node == name))
            .map(|d| &d.node)
    }
}

/// Runs the schema-level rules against a built model.
pub(crate) fn validate_schema(model: &SchemaModel) -> Vec<Diagnostic> {
    let mut ctx = SemanticContext {
        model,
        diagnostics: Vec::new(),
    };

    validate_roots(&mut ctx);
    check_directive_values(&model.roots.directives, &mut ctx);

    for ty in model.types.values() {
        validate_name(&ty.name, Some(ty.pos), &mut ctx);
        check_directive_values(&ty.directives, &mut ctx);
        match &ty.kind {
            TypeKind::Scalar => {}
            TypeKind::Object(_) | TypeKind::Interface(_) => {
                validate_output_fields(ty, &mut ctx);
                validate_implements(ty, &mut ctx);
            }
            TypeKind::Union(union) => {
                if union.members.is_empty() {
                    ctx.push(
                        format!("Union type {} must define one or more member types.", ty.name),
                        Some(ty.pos),
                    );
                }
                let mut seen = HashSet::new();
                for member in &union.members {
                    let member_name = member.node.as_str();
                    if !seen.insert(member_name) {
                        ctx.push(
                            format!("Union type {} can only include type {} once.", ty.name, member_name),
                            Some(member.pos),
                        );
                        continue;
                    }
                    match model.get(member_name) {
                        None if is_builtin_scalar(member_name) => ctx.push(
                            format!(
                                "Union type {} can only include Object types, it cannot include {}.",
                                ty.name, member_name
                            ),
                            Some(member.pos),
                        ),
                        None => ctx.push(format!("Unknown type \"{}\".", member_name), Some(member.pos)),
                        Some(def) if !matches!(def.kind, TypeKind::Object(_)) => ctx.push(
                            format!(
                                "Union type {} can only include Object types, it cannot include {}.",
                                ty.name, member_name
                            ),
                            Some(member.pos),
                        ),
                        Some(_) => {}
                    }
                }
            }
            TypeKind::Enum(e) => {
                if e.values.is_empty() {
                    ctx.push(
                        format!("Enum type {} must define one or more values.", ty.name),
                        Some(ty.pos),
                    );
                }
                for value in &e.values {
                    let name = value.node.value.node.as_str();
                    validate_name(name, Some(value.node.value.pos), &mut ctx);
                    if matches!(name, "true" | "false" | "null") {
                        ctx.push(
                            format!("Enum type {} cannot include value: {}.", ty.name, name),
                            Some(value.node.value.pos),
                        );
                    }
                    check_directive_values(&value.node.directives, &mut ctx);
                }
            }
            TypeKind::InputObject(input) => {
                if input.fields.is_empty() {
                    ctx.push(
                        format!("Input Object type {} must define one or more fields.", ty.name),
                        Some(ty.pos),
                    );
                }
                for field in &input.fields {
                    let owner = format!("{}.{}", ty.name, field.node.name.node);
                    validate_input_value(&owner, &field.node, &mut ctx);
                }
            }
        }
    }

    for directive in model.directives.values() {
        validate_name(&directive.node.name.node, Some(directive.node.name.pos), &mut ctx);
        for argument in &directive.node.arguments {
            let owner = format!("@{}({}:)", directive.node.name.node, argument.node.name.node);
            validate_input_value(&owner, &argument.node, &mut ctx);
        }
    }

    validate_input_cycles(&mut ctx);

    let mut diagnostics = ctx.diagnostics;
    sort_by_location(&mut diagnostics);
    diagnostics
}

fn validate_name(name: &str, pos: Option<Pos>, ctx: &mut SemanticContext<'_>) {
    if name.starts_with("__") {
        ctx.push(
            format!(
                "Name \"{}\" must not begin with \"__\", which is reserved by GraphQL introspection.",
                name
            ),
            pos,
        );
    }
}

fn validate_roots(ctx: &mut SemanticContext<'_>) {
    let model = ctx.model;
    let roots = [
        ("Query", &model.roots.query),
        ("Mutation", &model.roots.mutation),
        ("Subscription", &model.roots.subscription),
    ];
    let mut used_by: Vec<(&str, &str)> = Vec::new();

    for (operation, declared) in roots {
        let (name, pos) = match (declared, model.roots.pos) {
            (Some(declared), _) => (declared.node.as_str(), Some(declared.pos)),
            (None, Some(_)) => continue,
            (None, None) if model.types.contains_key(operation) => (operation, model.get(operation).map(|t| t.pos)),
            (None, None) => continue,
        };

        match model.get(name) {
            None => {
                ctx.push(format!("Unknown type \"{}\".", name), pos);
                continue;
            }
            Some(ty) if !matches!(ty.kind, TypeKind::Object(_)) => {
                ctx.push(
                    format!(
                        "{} root type must be Object type, it cannot be {}.",
                        operation, name
                    ),
                    pos,
                );
            }
            Some(_) => {}
        }

        if let Some((_, first)) = used_by.iter().find(|(type_name, _)| *type_name == name) {
            ctx.push(
                format!(
                    "All root types must be different, \"{}\" type is used as {} and {} root types.",
                    name,
                    first.to_lowercase(),
                    operation.to_lowercase()
                ),
                pos,
            );
        }
        used_by.push((name, operation));
    }

    if model.query_type().is_none() {
        ctx.push("Query root type must be provided.", model.roots.pos);
    }
}

fn named_type(ty: &Type) -> &str {
    match &ty.base {
        BaseType::Named(name) => name.as_str(),
        BaseType::List(inner) => named_type(inner),
    }
}

fn validate_output_fields(ty: &TypeDef, ctx: &mut SemanticContext<'_>) {
    if ty.fields().is_empty() {
        ctx.push(
            format!("Type {} must define one or more fields.", ty.name),
            Some(ty.pos),
        );
    }

    for field in ty.fields() {
        let field_name = field.node.name.node.as_str();
        validate_name(field_name, Some(field.node.name.pos), ctx);
        check_directive_values(&field.node.directives, ctx);

        let type_name = named_type(&field.node.ty.node);
        match ctx.model.get(type_name) {
            None if is_builtin_scalar(type_name) => {}
            None => ctx.push(format!("Unknown type \"{}\".", type_name), Some(field.node.ty.pos)),
            Some(def) if !def.is_output_type() => ctx.push(
                format!(
                    "The type of {}.{} must be Output Type but got: {}.",
                    ty.name, field_name, field.node.ty.node
                ),
                Some(field.node.ty.pos),
            ),
            Some(_) => {}
        }

        for argument in &field.node.arguments {
            let owner = format!("{}.{}({}:)", ty.name, field_name, argument.node.name.node);
            validate_input_value(&owner, &argument.node, ctx);
        }
    }
}

/// Arguments, input fields and directive arguments share these rules.
fn validate_input_value(owner: &str, value: &InputValueDefinition, ctx: &mut SemanticContext<'_>) {
    validate_name(&value.name.node, Some(value.name.pos), ctx);
    check_directive_values(&value.directives, ctx);

    let type_name = named_type(&value.ty.node);
    if !ctx.model.resolves(type_name) {
        ctx.push(format!("Unknown type \"{}\".", type_name), Some(value.ty.pos));
        return;
    }
    if !ctx.model.is_input_type(type_name) {
        ctx.push(
            format!("The type of {} must be Input Type but got: {}.", owner, value.ty.node),
            Some(value.ty.pos),
        );
        return;
    }

    if let Some(default) = &value.default_value {
        let mut errors = Vec::new();
        value_errors(ctx.model, &default.node, &value.ty.node, &mut errors);
        for error in errors {
            ctx.push(
                format!("Invalid default value for {}: {}", owner, error),
                Some(default.pos),
            );
        }
    }
}

fn validate_implements(ty: &TypeDef, ctx: &mut SemanticContext<'_>) {
    let model = ctx.model;
    let mut seen = HashSet::new();

    for iface_name in ty.implements() {
        let name = iface_name.node.as_str();
        if name == ty.name {
            ctx.push(
                format!(
                    "Type {} cannot implement itself because it would create a circular reference.",
                    ty.name
                ),
                Some(iface_name.pos),
            );
            continue;
        }
        if !seen.insert(name) {
            ctx.push(
                format!("Type {} can only implement {} once.", ty.name, name),
                Some(iface_name.pos),
            );
            continue;
        }
        let Some(iface) = model.get(name) else {
            ctx.push(format!("Unknown type \"{}\".", name), Some(iface_name.pos));
            continue;
        };
        if !matches!(iface.kind, TypeKind::Interface(_)) {
            ctx.push(
                format!(
                    "Type {} must only implement Interface types, it cannot implement {}.",
                    ty.name, name
                ),
                Some(iface_name.pos),
            );
            continue;
        }

        for transitive in iface.implements() {
            let transitive = transitive.node.as_str();
            if transitive != ty.name && !ty.implements().iter().any(|i| i.node == transitive) {
                ctx.push(
                    format!(
                        "Type {} must implement {} because it is implemented by {}.",
                        ty.name, transitive, name
                    ),
                    Some(iface_name.pos),
                );
            }
        }

        for iface_field in iface.fields() {
            validate_interface_field(ty, &iface.name, &iface_field.node, ctx);
        }
    }
}

fn validate_interface_field(
    ty: &TypeDef,
    iface_name: &str,
    iface_field: &FieldDefinition,
    ctx: &mut SemanticContext<'_>,
) {
    let field_name = iface_field.name.node.as_str();
    let Some(field) = ty.fields().iter().find(|f| f.node.name.node == field_name) else {
        ctx.push(
            format!(
                "Interface field {}.{} expected but {} does not provide it.",
                iface_name, field_name, ty.name
            ),
            Some(ty.pos),
        );
        return;
    };

    if !is_subtype(ctx.model, &field.node.ty.node, &iface_field.ty.node) {
        ctx.push(
            format!(
                "Interface field {}.{} expects type {} but {}.{} is type {}.",
                iface_name, field_name, iface_field.ty.node, ty.name, field_name, field.node.ty.node
            ),
            Some(field.node.ty.pos),
        );
    }

    for iface_arg in &iface_field.arguments {
        let arg_name = iface_arg.node.name.node.as_str();
        let Some(arg) = field.node.arguments.iter().find(|a| a.node.name.node == arg_name) else {
            ctx.push(
                format!(
                    "Interface field argument {}.{}({}:) expected but {}.{} does not provide it.",
                    iface_name, field_name, arg_name, ty.name, field_name
                ),
                Some(field.pos),
            );
            continue;
        };
        if arg.node.ty.node.to_string() != iface_arg.node.ty.node.to_string() {
            ctx.push(
                format!(
                    "Interface field argument {}.{}({}:) expects type {} but {}.{}({}:) is type {}.",
                    iface_name,
                    field_name,
                    arg_name,
                    iface_arg.node.ty.node,
                    ty.name,
                    field_name,
                    arg_name,
                    arg.node.ty.node
                ),
                Some(arg.node.ty.pos),
            );
        }
    }

    for arg in &field.node.arguments {
        let arg_name = arg.node.name.node.as_str();
        let declared = iface_field.arguments.iter().any(|a| a.node.name.node == arg_name);
        let required = !arg.node.ty.node.nullable && arg.node.default_value.is_none();
        if !declared && required {
            ctx.push(
                format!(
                    "Argument \"{}.{}({}:)\" must not be required type \"{}\" if not provided by the Interface field \"{}.{}\".",
                    ty.name, field_name, arg_name, arg.node.ty.node, iface_name, field_name
                ),
                Some(arg.pos),
            );
        }
    }
}

/// Covariant output subtyping used by interface implementations.
fn is_subtype(model: &SchemaModel, sub: &Type, sup: &Type) -> bool {
    if !sup.nullable && sub.nullable {
        return false;
    }
    match (&sub.base, &sup.base) {
        (BaseType::List(sub), BaseType::List(sup)) => is_subtype(model, sub, sup),
        (BaseType::Named(sub), BaseType::Named(sup)) => model.is_possible_type(sup, sub),
        _ => false,
    }
}

fn check_directive_values(directives: &[Positioned<ConstDirective>], ctx: &mut SemanticContext<'_>) {
    for directive in directives {
        let name = directive.node.name.node.as_str();
        // unknown directives and arguments were reported by the SDL rules
        let Some(definition) = ctx.directive(name) else {
            continue;
        };
        for (arg_name, value) in &directive.node.arguments {
            let Some(arg_def) = definition
                .arguments
                .iter()
                .find(|a| a.node.name.node == arg_name.node)
            else {
                continue;
            };
            let mut errors = Vec::new();
            value_errors(ctx.model, &value.node, &arg_def.node.ty.node, &mut errors);
            for error in errors {
                ctx.push(
                    format!(
                        "Invalid value for argument \"{}\" of directive \"@{}\": {}",
                        arg_name.node, name, error
                    ),
                    Some(value.pos),
                );
            }
        }
    }
}

/// Collects every reason `value` cannot be coerced to `ty`.
pub(crate) fn value_errors(model: &SchemaModel, value: &ConstValue, ty: &Type, errors: &mut Vec<String>) {
    if matches!(value, ConstValue::Null) {
        if !ty.nullable {
            errors.push(format!("Expected value of type \"{}\", found null.", ty));
        }
        return;
    }

    match &ty.base {
        BaseType::List(item) => match value {
            ConstValue::List(items) => {
                for item_value in items {
                    value_errors(model, item_value, item, errors);
                }
            }
            single => value_errors(model, single, item, errors),
        },
        BaseType::Named(name) => named_value_errors(model, value, name, errors),
    }
}

fn named_value_errors(model: &SchemaModel, value: &ConstValue, type_name: &str, errors: &mut Vec<String>) {
    let valid = match type_name {
        "Int" => matches!(value, ConstValue::Number(n) if n.as_i64().is_some_and(|i| i32::try_from(i).is_ok())),
        "Float" => matches!(value, ConstValue::Number(_)),
        "String" => matches!(value, ConstValue::String(_)),
        "Boolean" => matches!(value, ConstValue::Boolean(_)),
        "ID" => matches!(value, ConstValue::String(_))
            || matches!(value, ConstValue::Number(n) if n.is_i64()),
        _ => {
            let Some(def) = model.get(type_name) else {
                return;
            };
            return match &def.kind {
                TypeKind::Enum(e) => match value {
                    ConstValue::Enum(variant) if e.values.iter().any(|v| v.node.value.node == *variant) => {}
                    ConstValue::Enum(variant) => errors.push(format!(
                        "Value \"{}\" does not exist in \"{}\" enum.",
                        variant, type_name
                    )),
                    other => errors.push(format!(
                        "Enum \"{}\" cannot represent non-enum value: {}.",
                        type_name, other
                    )),
                },
                TypeKind::InputObject(input) => input_object_errors(model, value, type_name, &input.fields, errors),
                _ => {}
            };
        }
    };

    if !valid {
        errors.push(format!("Expected value of type \"{}\", found {}.", type_name, value));
    }
}

fn input_object_errors(
    model: &SchemaModel,
    value: &ConstValue,
    type_name: &str,
    fields: &[Positioned<InputValueDefinition>],
    errors: &mut Vec<String>,
) {
    let ConstValue::Object(object) = value else {
        errors.push(format!("Expected value of type \"{}\", found {}.", type_name, value));
        return;
    };

    for key in object.keys() {
        if !fields.iter().any(|f| f.node.name.node == *key) {
            errors.push(format!("Field \"{}\" is not defined by type \"{}\".", key, type_name));
        }
    }

    for field in fields {
        let field = &field.node;
        match object.get(field.name.node.as_str()) {
            Some(field_value) => value_errors(model, field_value, &field.ty.node, errors),
            None if !field.ty.node.nullable && field.default_value.is_none() => errors.push(format!(
                "Field \"{}.{}\" of required type \"{}\" was not provided.",
                type_name, field.name.node, field.ty.node
            )),
            None => {}
        }
    }
}

/// Input objects must not reference themselves through non-null singular fields.
fn validate_input_cycles(ctx: &mut SemanticContext<'_>) {
    let model = ctx.model;
    let mut visited = HashSet::new();
    let mut path = Vec::new();
    let mut path_index = HashMap::new();

    for ty in model.types.values() {
        if matches!(ty.kind, TypeKind::InputObject(_)) {
            detect_cycles(ty, &mut visited, &mut path, &mut path_index, ctx);
        }
    }
}

fn detect_cycles<'a>(
    ty: &'a TypeDef,
    visited: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
    path_index: &mut HashMap<&'a str, usize>,
    ctx: &mut SemanticContext<'a>,
) {
    if !visited.insert(ty.name.as_str()) {
        return;
    }
    path_index.insert(ty.name.as_str(), path.len());

    for field in ty.input_fields() {
        let field_ty = &field.node.ty.node;
        let BaseType::Named(target) = &field_ty.base else {
            continue;
        };
        if field_ty.nullable {
            continue;
        }
        let Some(target_def) = ctx.model.get(target.as_str()) else {
            continue;
        };
        if !matches!(target_def.kind, TypeKind::InputObject(_)) {
            continue;
        }

        path.push(field.node.name.node.as_str());
        match path_index.get(target.as_str()) {
            Some(&start) => {
                let cycle = path[start..].join(".");
                ctx.push(
                    format!(
                        "Cannot reference Input Object \"{}\" within itself through a series of non-null fields: \"{}\".",
                        target, cycle
                    ),
                    Some(target_def.pos),
                );
            }
            None => detect_cycles(target_def, visited, path, path_index, ctx),
        }
        path.pop();
    }

    path_index.remove(ty.name.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::build;
    use async_graphql::parser::parse_schema;

    fn messages(sdl: &str) -> Vec<String> {
        let model = build(&parse_schema(sdl).unwrap()).unwrap();
        validate_schema(&model).into_iter().map(|d| d.message).collect()
    }

    #[test]
    fn test_valid_schema() {
        assert!(messages("type Query { hello: String! }").is_empty());
    }

    #[test]
    fn test_missing_query_root() {
        assert_eq!(
            messages("type Ship { id: ID! }"),
            ["Query root type must be provided."]
        );
    }

    #[test]
    fn test_unknown_type_reference() {
        assert_eq!(
            messages("type Query { ship: Ship }"),
            ["Unknown type \"Ship\"."]
        );
    }

    #[test]
    fn test_input_and_output_positions() {
        let found = messages(
            "input Filter { name: String }\n\
             type Query { a(filter: Query): Filter }",
        );
        assert_eq!(
            found,
            [
                "The type of Query.a(filter:) must be Input Type but got: Query.",
                "The type of Query.a must be Output Type but got: Filter.",
            ]
        );
    }

    #[test]
    fn test_interface_consistency() {
        let found = messages(
            "interface Node { id: ID! name(lang: String): String }\n\
             type Query implements Node { id: ID }",
        );
        assert_eq!(
            found,
            [
                "Interface field Node.name expected but Query does not provide it.",
                "Interface field Node.id expects type ID! but Query.id is type ID.",
            ]
        );
    }

    #[test]
    fn test_covariant_interface_field() {
        let found = messages(
            "interface Node { id: ID! parent: Node }\n\
             type Query implements Node { id: ID! parent: Query }",
        );
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_union_members_must_be_objects() {
        let found = messages("type Query { a: Int }\nunion U = Query | String");
        assert_eq!(
            found,
            ["Union type U can only include Object types, it cannot include String."]
        );
    }

    #[test]
    fn test_directive_argument_values() {
        let found = messages(
            "input Data { someField: String! anotherField: String! }\n\
             directive @someDirective(args: [Data!]!) on OBJECT\n\
             type SomeType @someDirective(args: [{someField: \"blah\", anotherField: \"blah\"}]) { column1: String }\n\
             type AnotherType @someDirective(args: [{blah: \"blah\", blah2: \"blah\"}]) { column2: String }\n\
             type Query { empty: String }",
        );
        assert_eq!(
            found,
            [
                "Invalid value for argument \"args\" of directive \"@someDirective\": Field \"blah\" is not defined by type \"Data\".",
                "Invalid value for argument \"args\" of directive \"@someDirective\": Field \"blah2\" is not defined by type \"Data\".",
                "Invalid value for argument \"args\" of directive \"@someDirective\": Field \"Data.someField\" of required type \"String!\" was not provided.",
                "Invalid value for argument \"args\" of directive \"@someDirective\": Field \"Data.anotherField\" of required type \"String!\" was not provided.",
            ]
        );
    }

    #[test]
    fn test_enum_and_scalar_values() {
        let found = messages(
            "enum Color { RED }\n\
             directive @paint(color: Color, times: Int) on FIELD_DEFINITION\n\
             type Query { a: Int @paint(color: BLUE, times: \"twice\") }",
        );
        assert_eq!(
            found,
            [
                "Invalid value for argument \"color\" of directive \"@paint\": Value \"BLUE\" does not exist in \"Color\" enum.",
                "Invalid value for argument \"times\" of directive \"@paint\": Expected value of type \"Int\", found \"twice\".",
            ]
        );
    }

    #[test]
    fn test_input_object_cycle() {
        let found = messages(
            "input A { b: B! }\ninput B { a: A! }\ntype Query { f(a: A): Int }",
        );
        assert_eq!(
            found,
            ["Cannot reference Input Object \"A\" within itself through a series of non-null fields: \"b.a\"."]
        );
    }

    #[test]
    fn test_reserved_names() {
        let found = messages("type Query { __secret: Int }");
        assert_eq!(
            found,
            ["Name \"__secret\" must not begin with \"__\", which is reserved by GraphQL introspection."]
        );
    }

    #[test]
    fn test_root_type_kinds() {
        let found = messages("schema { query: Q }\ninput Q { a: Int }");
        assert_eq!(found, ["Query root type must be Object type, it cannot be Q."]);
    }
}
