//! Document-level SDL rules.
//!
//! These run on the parsed document only. Nothing here resolves a type
//! reference; that needs the built schema and happens in [`super::semantic`].

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use async_graphql::parser::Positioned;
use async_graphql::parser::types::{
    ConstDirective, DirectiveDefinition, DirectiveLocation, FieldDefinition, InputValueDefinition,
    ServiceDocument, TypeDefinition, TypeKind, TypeSystemDefinition,
};
use async_graphql::parser::{Pos, parse_schema};

use super::diagnostic::Diagnostic;
use super::model::kind_name;

const BUILTIN_DIRECTIVES_SDL: &str = r#"
directive @skip(if: Boolean!) on FIELD | FRAGMENT_SPREAD | INLINE_FRAGMENT
directive @include(if: Boolean!) on FIELD | FRAGMENT_SPREAD | INLINE_FRAGMENT
directive @deprecated(reason: String = "No longer supported") on FIELD_DEFINITION | ARGUMENT_DEFINITION | INPUT_FIELD_DEFINITION | ENUM_VALUE
directive @specifiedBy(url: String!) on SCALAR
directive @oneOf on INPUT_OBJECT
"#;

static BUILTIN_DIRECTIVES: LazyLock<Vec<Positioned<DirectiveDefinition>>> = LazyLock::new(|| {
    let document = parse_schema(BUILTIN_DIRECTIVES_SDL).expect("built-in directive SDL parses");
    document
        .definitions
        .into_iter()
        .filter_map(|definition| match definition {
            TypeSystemDefinition::Directive(directive) => Some(directive),
            _ => None,
        })
        .collect()
});

/// Directive definitions that exist without being declared. None of them is
/// repeatable.
pub(crate) fn builtin_directives() -> &'static [Positioned<DirectiveDefinition>] {
    &BUILTIN_DIRECTIVES
}

pub(crate) fn location_name(location: &DirectiveLocation) -> &'static str {
    match location {
        DirectiveLocation::Query => "QUERY",
        DirectiveLocation::Mutation => "MUTATION",
        DirectiveLocation::Subscription => "SUBSCRIPTION",
        DirectiveLocation::Field => "FIELD",
        DirectiveLocation::FragmentDefinition => "FRAGMENT_DEFINITION",
        DirectiveLocation::FragmentSpread => "FRAGMENT_SPREAD",
        DirectiveLocation::InlineFragment => "INLINE_FRAGMENT",
        DirectiveLocation::VariableDefinition => "VARIABLE_DEFINITION",
        DirectiveLocation::Schema => "SCHEMA",
        DirectiveLocation::Scalar => "SCALAR",
        DirectiveLocation::Object => "OBJECT",
        DirectiveLocation::FieldDefinition => "FIELD_DEFINITION",
        DirectiveLocation::ArgumentDefinition => "ARGUMENT_DEFINITION",
        DirectiveLocation::Interface => "INTERFACE",
        DirectiveLocation::Union => "UNION",
        DirectiveLocation::Enum => "ENUM",
        DirectiveLocation::EnumValue => "ENUM_VALUE",
        DirectiveLocation::InputObject => "INPUT_OBJECT",
        DirectiveLocation::InputFieldDefinition => "INPUT_FIELD_DEFINITION",
    }
}

fn type_location(kind: &TypeKind) -> DirectiveLocation {
    match kind {
        TypeKind::Scalar => DirectiveLocation::Scalar,
        TypeKind::Object(_) => DirectiveLocation::Object,
        TypeKind::Interface(_) => DirectiveLocation::Interface,
        TypeKind::Union(_) => DirectiveLocation::Union,
        TypeKind::Enum(_) => DirectiveLocation::Enum,
        TypeKind::InputObject(_) => DirectiveLocation::InputObject,
    }
}

struct SdlContext<'a> {
    source: &'a str,
    directive_definitions: HashMap<&'a str, &'a DirectiveDefinition>,
    type_definitions: HashMap<&'a str, &'a Positioned<TypeDefinition>>,
    /// Member names seen per type, shared between a type and its extensions.
    members: HashMap<&'a str, HashSet<&'a str>>,
    /// Non-repeatable directives seen per type, shared with extensions.
    type_directives: HashMap<&'a str, HashSet<&'a str>>,
    /// Declared directives marked `repeatable` in the source.
    repeatable: HashSet<&'a str>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> SdlContext<'a> {
    fn push(&mut self, message: impl Into<String>, pos: Pos) {
        self.diagnostics.push(Diagnostic::structural(message, pos));
    }
}

/// Runs every document-level rule and returns the findings in document order.
pub(crate) fn validate_sdl<'a>(source: &'a str, document: &'a ServiceDocument) -> Vec<Diagnostic> {
    let mut ctx = SdlContext {
        source,
        directive_definitions: builtin_directives()
            .iter()
            .map(|d| (d.node.name.node.as_str(), &d.node))
            .collect(),
        type_definitions: HashMap::new(),
        members: HashMap::new(),
        type_directives: HashMap::new(),
        repeatable: HashSet::new(),
        diagnostics: Vec::new(),
    };

    collect_definitions(document, &mut ctx);

    for definition in &document.definitions {
        match definition {
            TypeSystemDefinition::Schema(schema) => {
                let mut seen = HashSet::new();
                check_directives(&schema.node.directives, DirectiveLocation::Schema, &mut seen, &mut ctx);
            }
            TypeSystemDefinition::Type(ty) => validate_type(ty, &mut ctx),
            TypeSystemDefinition::Directive(directive) => {
                let owner = format!("@{}", directive.node.name.node);
                validate_arguments(&owner, &directive.node.arguments, &mut ctx);
            }
        }
    }

    let mut diagnostics = ctx.diagnostics;
    super::diagnostic::sort_by_location(&mut diagnostics);
    diagnostics
}

/// Registers names, reporting duplicates of schemas, types and directives.
fn collect_definitions<'a>(document: &'a ServiceDocument, ctx: &mut SdlContext<'a>) {
    let mut schema_seen = false;
    let mut operation_types: HashSet<&'static str> = HashSet::new();

    for definition in &document.definitions {
        match definition {
            TypeSystemDefinition::Schema(schema) => {
                if !schema.node.extend {
                    if schema_seen {
                        ctx.push("Must provide only one schema definition.", schema.pos);
                    }
                    schema_seen = true;
                }
                let roots = [
                    ("query", &schema.node.query),
                    ("mutation", &schema.node.mutation),
                    ("subscription", &schema.node.subscription),
                ];
                for (operation, name) in roots {
                    let Some(name) = name else { continue };
                    if !operation_types.insert(operation) {
                        ctx.push(
                            format!("There can be only one {} type in schema.", operation),
                            name.pos,
                        );
                    }
                }
            }
            TypeSystemDefinition::Type(ty) if !ty.node.extend => {
                let name = ty.node.name.node.as_str();
                if ctx.type_definitions.insert(name, ty).is_some() {
                    ctx.push(
                        format!("There can be only one type named \"{}\".", name),
                        ty.node.name.pos,
                    );
                }
            }
            TypeSystemDefinition::Type(_) => {}
            TypeSystemDefinition::Directive(directive) => {
                let name = directive.node.name.node.as_str();
                let builtin = builtin_directives()
                    .iter()
                    .any(|d| d.node.name.node == name);
                if builtin {
                    ctx.push(
                        format!(
                            "Directive \"@{}\" already exists in the schema. It cannot be redefined.",
                            name
                        ),
                        directive.node.name.pos,
                    );
                } else if ctx
                    .directive_definitions
                    .insert(name, &directive.node)
                    .is_some()
                {
                    ctx.push(
                        format!("There can be only one directive named \"@{}\".", name),
                        directive.node.name.pos,
                    );
                } else if is_repeatable(ctx.source, &directive.node) {
                    ctx.repeatable.insert(name);
                }
            }
        }
    }
}

fn validate_type<'a>(ty: &'a Positioned<TypeDefinition>, ctx: &mut SdlContext<'a>) {
    let type_name = ty.node.name.node.as_str();

    if ty.node.extend {
        match ctx.type_definitions.get(type_name).copied().map(|base| &base.node.kind) {
            None => ctx.push(
                format!("Cannot extend type \"{}\" because it is not defined.", type_name),
                ty.node.name.pos,
            ),
            Some(base) if std::mem::discriminant(base) != std::mem::discriminant(&ty.node.kind) => {
                let message = format!(
                    "Cannot extend non-{} type \"{}\".",
                    kind_name(&ty.node.kind),
                    type_name
                );
                ctx.push(message, ty.node.name.pos);
            }
            Some(_) => {}
        }
    }

    let mut seen = ctx.type_directives.remove(type_name).unwrap_or_default();
    check_directives(&ty.node.directives, type_location(&ty.node.kind), &mut seen, ctx);
    ctx.type_directives.insert(type_name, seen);

    let mut members = ctx.members.remove(type_name).unwrap_or_default();
    match &ty.node.kind {
        TypeKind::Scalar | TypeKind::Union(_) => {}
        TypeKind::Object(obj) => validate_fields(type_name, &obj.fields, &mut members, ctx),
        TypeKind::Interface(iface) => validate_fields(type_name, &iface.fields, &mut members, ctx),
        TypeKind::Enum(e) => {
            for value in &e.values {
                let name = value.node.value.node.as_str();
                if !members.insert(name) {
                    ctx.push(
                        format!("Enum value \"{}.{}\" can only be defined once.", type_name, name),
                        value.node.value.pos,
                    );
                }
                let mut seen = HashSet::new();
                check_directives(&value.node.directives, DirectiveLocation::EnumValue, &mut seen, ctx);
            }
        }
        TypeKind::InputObject(input) => {
            for field in &input.fields {
                let name = field.node.name.node.as_str();
                if !members.insert(name) {
                    ctx.push(
                        format!("Field \"{}.{}\" can only be defined once.", type_name, name),
                        field.node.name.pos,
                    );
                }
                let mut seen = HashSet::new();
                check_directives(
                    &field.node.directives,
                    DirectiveLocation::InputFieldDefinition,
                    &mut seen,
                    ctx,
                );
            }
        }
    }
    ctx.members.insert(type_name, members);
}

fn validate_fields<'a>(
    type_name: &'a str,
    fields: &'a [Positioned<FieldDefinition>],
    members: &mut HashSet<&'a str>,
    ctx: &mut SdlContext<'a>,
) {
    for field in fields {
        let name = field.node.name.node.as_str();
        if !members.insert(name) {
            ctx.push(
                format!("Field \"{}.{}\" can only be defined once.", type_name, name),
                field.node.name.pos,
            );
        }
        let mut seen = HashSet::new();
        check_directives(&field.node.directives, DirectiveLocation::FieldDefinition, &mut seen, ctx);
        validate_arguments(&format!("{}.{}", type_name, name), &field.node.arguments, ctx);
    }
}

/// Unique argument definitions plus the directives applied to each of them.
fn validate_arguments<'a>(
    owner: &str,
    arguments: &'a [Positioned<InputValueDefinition>],
    ctx: &mut SdlContext<'a>,
) {
    let mut names = HashSet::new();
    for argument in arguments {
        let name = argument.node.name.node.as_str();
        if !names.insert(name) {
            ctx.push(
                format!("Argument \"{}({}:)\" can only be defined once.", owner, name),
                argument.node.name.pos,
            );
        }
        let mut seen = HashSet::new();
        check_directives(
            &argument.node.directives,
            DirectiveLocation::ArgumentDefinition,
            &mut seen,
            ctx,
        );
    }
}

/// Whether a directive definition carries the `repeatable` keyword.
///
/// The parser sets `DirectiveDefinition::is_repeatable` on every definition,
/// so the keyword is looked up in the source between the directive name and
/// its first location, skipping the argument list.
fn is_repeatable(source: &str, definition: &DirectiveDefinition) -> bool {
    let Some(first_location) = definition.locations.first() else {
        return false;
    };
    let start = byte_offset(source, definition.name.pos);
    let end = byte_offset(source, first_location.pos);
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            let header = source[start..end]
                .trim_start_matches('@')
                .trim_start_matches(|c: char| c == '_' || c.is_ascii_alphanumeric());
            has_top_level_word(header, "repeatable")
        }
        _ => false,
    }
}

/// Byte offset of a 1-based line and character column.
fn byte_offset(source: &str, pos: Pos) -> Option<usize> {
    let line_start = match pos.line {
        0 | 1 => 0,
        line => source.match_indices('\n').nth(line - 2)?.0 + 1,
    };
    let line = source.get(line_start..)?;
    let column = line
        .char_indices()
        .nth(pos.column.saturating_sub(1))
        .map_or(line.len(), |(offset, _)| offset);
    Some(line_start + column)
}

/// Looks for `word` as a name token outside parentheses, strings and comments.
fn has_top_level_word(text: &str, word: &str) -> bool {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'"' if text[i..].starts_with("\"\"\"") => {
                i += 3;
                match text[i..].find("\"\"\"") {
                    Some(end) => i += end + 3,
                    None => return false,
                }
                continue;
            }
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b if b == b'_' || b.is_ascii_alphabetic() => {
                let start = i;
                while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                    i += 1;
                }
                if depth == 0 && &text[start..i] == word {
                    return true;
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    false
}

/// Known directives, allowed locations, repetition and argument names.
fn check_directives<'a>(
    directives: &'a [Positioned<ConstDirective>],
    location: DirectiveLocation,
    seen: &mut HashSet<&'a str>,
    ctx: &mut SdlContext<'a>,
) {
    for directive in directives {
        let name = directive.node.name.node.as_str();
        let Some(definition) = ctx.directive_definitions.get(name).copied() else {
            ctx.push(format!("Unknown directive \"@{}\".", name), directive.pos);
            continue;
        };

        let allowed = definition
            .locations
            .iter()
            .any(|l| location_name(&l.node) == location_name(&location));
        if !allowed {
            ctx.push(
                format!(
                    "Directive \"@{}\" may not be used on {}.",
                    name,
                    location_name(&location)
                ),
                directive.pos,
            );
        }

        if !ctx.repeatable.contains(name) && !seen.insert(name) {
            ctx.push(
                format!("The directive \"@{}\" can only be used once at this location.", name),
                directive.pos,
            );
        }

        let mut provided = HashSet::new();
        for (arg_name, _) in &directive.node.arguments {
            let arg = arg_name.node.as_str();
            if !provided.insert(arg) {
                ctx.push(
                    format!("There can be only one argument named \"{}\".", arg),
                    arg_name.pos,
                );
            }
            if !definition.arguments.iter().any(|a| a.node.name.node == arg) {
                ctx.push(
                    format!("Unknown argument \"{}\" on directive \"@{}\".", arg, name),
                    arg_name.pos,
                );
            }
        }

        for required in &definition.arguments {
            let required = &required.node;
            let is_required = !required.ty.node.nullable && required.default_value.is_none();
            if is_required && !provided.contains(required.name.node.as_str()) {
                ctx.push(
                    format!(
                        "Directive \"@{}\" argument \"{}\" of type \"{}\" is required, but it was not provided.",
                        name, required.name.node, required.ty.node
                    ),
                    directive.pos,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(sdl: &str) -> Vec<String> {
        validate_sdl(sdl, &parse_schema(sdl).unwrap())
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn test_clean_document() {
        assert!(messages("type Query { hello: String! }").is_empty());
    }

    #[test]
    fn test_duplicate_type_names() {
        let found = messages("type Query { a: Int }\ntype A { x: Int }\ntype A { y: Int }");
        assert_eq!(found, ["There can be only one type named \"A\"."]);
    }

    #[test]
    fn test_duplicate_fields_across_extension() {
        let found = messages("type Query { a: Int }\nextend type Query { a: String }");
        assert_eq!(found, ["Field \"Query.a\" can only be defined once."]);
    }

    #[test]
    fn test_unknown_directive_has_location() {
        let sdl = "type Query @nope { a: Int }";
        let diags = validate_sdl(sdl, &parse_schema(sdl).unwrap());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "Unknown directive \"@nope\".");
        let loc = diags[0].location.unwrap();
        assert_eq!((loc.line, loc.column), (1, 12));
    }

    #[test]
    fn test_directive_location_and_repetition() {
        let found = messages(
            "directive @tag on FIELD_DEFINITION\n\
             type Query @tag { a: Int @tag @tag }",
        );
        assert_eq!(
            found,
            [
                "Directive \"@tag\" may not be used on OBJECT.",
                "The directive \"@tag\" can only be used once at this location.",
            ]
        );
    }

    #[test]
    fn test_repeatable_directive_may_repeat() {
        let sdl = "directive @tag(name: String = \"on repeatable\") repeatable on FIELD_DEFINITION\n\
                   directive @once(note: String = \"repeatable\") on FIELD_DEFINITION\n\
                   type Query { a: Int @tag @tag b: Int @once @once }";
        assert_eq!(
            messages(sdl),
            ["The directive \"@once\" can only be used once at this location."]
        );
    }

    #[test]
    fn test_builtin_deprecated_cannot_repeat() {
        let found = messages("type Query { a: Int @deprecated @deprecated }");
        assert_eq!(
            found,
            ["The directive \"@deprecated\" can only be used once at this location."]
        );
    }

    #[test]
    fn test_directive_named_repeatable() {
        let sdl = "directive @repeatable on FIELD_DEFINITION\n\
                   type Query { a: Int @repeatable @repeatable }";
        assert_eq!(messages(sdl).len(), 1);
    }

    #[test]
    fn test_directive_arguments() {
        let found = messages(
            "directive @limit(max: Int!) on OBJECT\n\
             type Query @limit(min: 1) { a: Int }",
        );
        assert_eq!(
            found,
            [
                "Directive \"@limit\" argument \"max\" of type \"Int!\" is required, but it was not provided.",
                "Unknown argument \"min\" on directive \"@limit\".",
            ]
        );
    }

    #[test]
    fn test_builtin_directive_redefinition() {
        let found = messages("directive @skip on FIELD\ntype Query { a: Int }");
        assert_eq!(
            found,
            ["Directive \"@skip\" already exists in the schema. It cannot be redefined."]
        );
    }

    #[test]
    fn test_extension_of_unknown_or_mismatched_type() {
        let found = messages("type Query { a: Int }\nextend type Missing { b: Int }\nextend enum Query { X }");
        assert_eq!(
            found,
            [
                "Cannot extend type \"Missing\" because it is not defined.",
                "Cannot extend non-enum type \"Query\".",
            ]
        );
    }

    #[test]
    fn test_schema_definition_rules() {
        let found = messages(
            "schema { query: Query }\nschema { query: Query }\ntype Query { a: Int }",
        );
        assert_eq!(
            found,
            [
                "Must provide only one schema definition.",
                "There can be only one query type in schema.",
            ]
        );
    }

    #[test]
    fn test_duplicate_arguments_and_enum_values() {
        let found = messages("type Query { a(x: Int, x: Int): Int }\nenum E { A A }");
        assert_eq!(
            found,
            [
                "Argument \"Query.a(x:)\" can only be defined once.",
                "Enum value \"E.A\" can only be defined once.",
            ]
        );
    }

    #[test]
    fn test_deprecated_is_known() {
        assert!(messages("type Query { a: Int @deprecated(reason: \"old\") }").is_empty());
    }
}
