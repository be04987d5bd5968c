use std::collections::HashSet;
use std::sync::Arc;

use async_graphql::dynamic::{
    Enum, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface, InterfaceField,
    Object, ResolverContext, Scalar, Schema, Subscription, SubscriptionField,
    SubscriptionFieldFuture, TypeRef, Union,
};
use async_graphql::parser::types::{
    BaseType, DocumentOperations, FieldDefinition, InputValueDefinition, OperationType, Type,
    TypeKind,
};
use async_graphql::parser::{Positioned, parse_query};
use async_graphql::{Error, Request, Response, Value};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use indexmap::IndexMap;
use tracing::error;

use super::resolvers::{ResolverArgs, ResolverRegistry, default_resolve};
use crate::error::{GqlwireError, Result};
use crate::schema::{Diagnostic, TypeDef, ValidatedSchema, is_builtin_scalar};

/// The kind of the operation a request selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// Parses `query` and reports the kind of the selected operation.
    pub fn classify(query: &str, operation_name: Option<&str>) -> std::result::Result<Self, Vec<Diagnostic>> {
        let document = parse_query(query).map_err(|err| vec![Diagnostic::from_parse_error(&err)])?;

        let operation = match (&document.operations, operation_name) {
            (DocumentOperations::Single(op), _) => op,
            (DocumentOperations::Multiple(ops), Some(name)) => match ops.get(name) {
                Some(op) => op,
                None => {
                    return Err(vec![Diagnostic::syntax(
                        format!("Unknown operation named \"{}\".", name),
                        None,
                    )]);
                }
            },
            (DocumentOperations::Multiple(ops), None) if ops.len() == 1 => {
                ops.values().next().ok_or_else(Vec::new)?
            }
            (DocumentOperations::Multiple(_), None) => {
                return Err(vec![Diagnostic::syntax(
                    "Operation name is required when the document contains multiple operations.",
                    None,
                )]);
            }
        };

        Ok(match operation.node.ty {
            OperationType::Query => Self::Query,
            OperationType::Mutation => Self::Mutation,
            OperationType::Subscription => Self::Subscription,
        })
    }
}

/// True for responses that carry errors and no data at all: the operation
/// failed before (or instead of) producing a payload.
pub fn is_failure(response: &Response) -> bool {
    matches!(response.data, Value::Null) && !response.errors.is_empty()
}

/// An executable schema: the validated type map bound to resolvers.
#[derive(Clone)]
pub struct Executor {
    schema: Schema,
    validated: ValidatedSchema,
}

impl Executor {
    /// Builds the executable schema. A failure means the validated schema
    /// and the execution library disagree, which is reported as internal.
    pub fn new(validated: &ValidatedSchema, resolvers: &ResolverRegistry) -> Result<Self> {
        let model = validated.model();
        let abstract_types: Arc<HashSet<String>> = Arc::new(
            model
                .types
                .values()
                .filter(|ty| ty.is_abstract())
                .map(|ty| ty.name.clone())
                .collect(),
        );
        let subscription_root = validated.subscription_type();

        let mut builder = Schema::build(
            validated.query_type(),
            validated.mutation_type(),
            subscription_root,
        );

        for ty in model.types.values() {
            builder = match &ty.kind {
                TypeKind::Scalar if is_builtin_scalar(&ty.name) => builder,
                TypeKind::Scalar => builder.register(Scalar::new(ty.name.as_str())),
                TypeKind::Object(_) if Some(ty.name.as_str()) == subscription_root => {
                    builder.register(subscription_object(ty, resolvers, &abstract_types))
                }
                TypeKind::Object(obj) => {
                    let mut object = output_object(ty, resolvers, &abstract_types);
                    for iface in &obj.implements {
                        object = object.implement(iface.node.as_str());
                    }
                    builder.register(object)
                }
                TypeKind::Interface(iface) => {
                    let mut interface = Interface::new(ty.name.as_str());
                    for field in &iface.fields {
                        let mut iface_field =
                            InterfaceField::new(field.node.name.node.as_str(), type_ref(&field.node.ty.node));
                        for arg in &field.node.arguments {
                            iface_field = iface_field.argument(input_value(arg));
                        }
                        interface = interface.field(iface_field);
                    }
                    builder.register(interface)
                }
                TypeKind::Union(union) => {
                    let mut union_type = Union::new(ty.name.as_str());
                    for member in &union.members {
                        union_type = union_type.possible_type(member.node.as_str());
                    }
                    builder.register(union_type)
                }
                TypeKind::Enum(e) => {
                    let mut enum_type = Enum::new(ty.name.as_str());
                    for value in &e.values {
                        enum_type = enum_type.item(value.node.value.node.as_str());
                    }
                    builder.register(enum_type)
                }
                TypeKind::InputObject(input) => {
                    let mut input_object = InputObject::new(ty.name.as_str());
                    for field in &input.fields {
                        input_object = input_object.field(input_value(field));
                    }
                    builder.register(input_object)
                }
            };
        }

        let schema = builder.finish().map_err(|err| {
            error!("Executable schema rejected a validated schema: {}", err);
            GqlwireError::Internal(format!("failed to build executable schema: {}", err))
        })?;

        Ok(Self {
            schema,
            validated: validated.clone(),
        })
    }

    /// Runs a query or mutation to a single response.
    pub async fn execute(&self, request: impl Into<Request>) -> Response {
        self.schema.execute(request.into()).await
    }

    /// Runs a subscription as a lazy stream of responses.
    pub fn execute_stream(&self, request: impl Into<Request>) -> BoxStream<'static, Response> {
        self.schema.execute_stream(request.into()).boxed()
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("schema", &self.validated)
            .finish_non_exhaustive()
    }
}

fn type_ref(ty: &Type) -> TypeRef {
    let base = match &ty.base {
        BaseType::Named(name) => TypeRef::named(name.as_str()),
        BaseType::List(inner) => TypeRef::List(Box::new(type_ref(inner))),
    };
    if ty.nullable {
        base
    } else {
        TypeRef::NonNull(Box::new(base))
    }
}

fn input_value(definition: &Positioned<InputValueDefinition>) -> InputValue {
    let definition = &definition.node;
    let mut value = InputValue::new(definition.name.node.as_str(), type_ref(&definition.ty.node));
    if let Some(default) = &definition.default_value {
        value = value.default_value(default.node.clone());
    }
    if let Some(description) = &definition.description {
        value = value.description(description.node.as_str());
    }
    value
}

fn collect_args(ctx: &ResolverContext<'_>) -> IndexMap<String, Value> {
    ctx.args
        .iter()
        .map(|(name, value)| (name.to_string(), value.as_value().clone()))
        .collect()
}

/// Wraps a resolved value, tagging abstract-typed objects with the concrete
/// type named by their `__typename` property.
fn field_value<'a>(value: Value, ty: &Type, abstract_types: &HashSet<String>) -> FieldValue<'a> {
    match (&ty.base, value) {
        (_, Value::Null) => FieldValue::NULL,
        (BaseType::List(inner), Value::List(items)) => FieldValue::list(
            items
                .into_iter()
                .map(|item| field_value(item, inner, abstract_types)),
        ),
        (BaseType::Named(name), value) if abstract_types.contains(name.as_str()) => {
            let concrete = match &value {
                Value::Object(map) => match map.get("__typename") {
                    Some(Value::String(type_name)) => Some(type_name.clone()),
                    _ => None,
                },
                _ => None,
            };
            match concrete {
                Some(type_name) => FieldValue::value(value).with_type(type_name),
                None => FieldValue::value(value),
            }
        }
        (_, value) => FieldValue::value(value),
    }
}

fn output_object(ty: &TypeDef, resolvers: &ResolverRegistry, abstract_types: &Arc<HashSet<String>>) -> Object {
    let mut object = Object::new(ty.name.as_str());
    if let Some(description) = &ty.description {
        object = object.description(description.as_str());
    }
    for field in ty.fields() {
        object = object.field(output_field(&ty.name, &field.node, resolvers, abstract_types));
    }
    object
}

fn output_field(
    type_name: &str,
    definition: &FieldDefinition,
    resolvers: &ResolverRegistry,
    abstract_types: &Arc<HashSet<String>>,
) -> Field {
    let field_name = definition.name.node.to_string();
    let resolver = resolvers.field_resolver(type_name, &field_name).cloned();
    let field_ty = definition.ty.node.clone();
    let abstract_types = Arc::clone(abstract_types);

    let mut field = Field::new(
        field_name.clone(),
        type_ref(&definition.ty.node),
        move |ctx| {
            let resolver = resolver.clone();
            let field_name = field_name.clone();
            let field_ty = field_ty.clone();
            let abstract_types = Arc::clone(&abstract_types);
            FieldFuture::new(async move {
                let parent = ctx.parent_value.as_value().cloned().unwrap_or(Value::Null);
                let value = match resolver {
                    Some(resolver) => {
                        let args = ResolverArgs {
                            parent,
                            args: collect_args(&ctx),
                        };
                        resolver(args).await?
                    }
                    None => default_resolve(&parent, &field_name),
                };
                Ok(Some(field_value(value, &field_ty, &abstract_types)))
            })
        },
    );
    for arg in &definition.arguments {
        field = field.argument(input_value(arg));
    }
    if let Some(description) = &definition.description {
        field = field.description(description.node.as_str());
    }
    field
}

fn subscription_object(
    ty: &TypeDef,
    resolvers: &ResolverRegistry,
    abstract_types: &Arc<HashSet<String>>,
) -> Subscription {
    let mut subscription = Subscription::new(ty.name.as_str());
    for definition in ty.fields() {
        let definition = &definition.node;
        let field_name = definition.name.node.to_string();
        let producer = resolvers.stream_resolver(&ty.name, &field_name).cloned();
        let missing = format!("No stream resolver registered for {}.{}", ty.name, field_name);
        let field_ty = definition.ty.node.clone();
        let abstract_types = Arc::clone(abstract_types);

        let mut field = SubscriptionField::new(
            field_name,
            type_ref(&definition.ty.node),
            move |ctx| {
                let producer = producer.clone();
                let missing = missing.clone();
                let field_ty = field_ty.clone();
                let abstract_types = Arc::clone(&abstract_types);
                SubscriptionFieldFuture::new(async move {
                    let Some(producer) = producer else {
                        return Err(Error::new(missing));
                    };
                    let args = ResolverArgs {
                        parent: Value::Null,
                        args: collect_args(&ctx),
                    };
                    Ok(producer(args).map(move |item| {
                        item.map(|value| field_value(value, &field_ty, &abstract_types))
                    }))
                })
            },
        );
        for arg in &definition.arguments {
            field = field.argument(input_value(arg));
        }
        subscription = subscription.field(field);
    }
    subscription
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate;
    use futures_util::stream;

    const SDL: &str = r#"
interface Vessel { name: String! }
type Ship implements Vessel { name: String! crew: Int }
type Boat implements Vessel { name: String! }
type Query {
    sayHello: String!
    fleet: [Vessel!]!
    ship: Ship
}
type Mutation { sendMessage(message: String!): String! }
type Subscription { greeting: String! }
"#;

    fn executor() -> Executor {
        let schema = validate(SDL).into_result().unwrap();
        let resolvers = ResolverRegistry::new()
            .field("Query", "sayHello", |_| async { Ok(Value::from("Hello")) })
            .field("Query", "fleet", |_| async {
                Ok(Value::from_json(serde_json::json!([
                    { "__typename": "Ship", "name": "Endeavour", "crew": 94 },
                    { "__typename": "Boat", "name": "Dinghy" }
                ]))?)
            })
            .field("Query", "ship", |_| async {
                Ok(Value::from_json(serde_json::json!({ "name": "Beagle", "crew": 74 }))?)
            })
            .field("Mutation", "sendMessage", |args| async move {
                Ok(Value::from(format!("You said {}", args.string_arg("message")?)))
            })
            .stream("Subscription", "greeting", |_| {
                stream::iter(["Hi", "Bonjour"]).map(|hi| Ok(Value::from(hi)))
            });
        Executor::new(&schema, &resolvers).unwrap()
    }

    #[test]
    fn test_classify_operations() {
        assert_eq!(OperationKind::classify("{ a }", None).unwrap(), OperationKind::Query);
        assert_eq!(
            OperationKind::classify("mutation M { a }", None).unwrap(),
            OperationKind::Mutation
        );
        assert_eq!(
            OperationKind::classify("query A { a } subscription B { b }", Some("B")).unwrap(),
            OperationKind::Subscription
        );
    }

    #[test]
    fn test_classify_errors() {
        let errors = OperationKind::classify("query {", None).unwrap_err();
        assert!(errors[0].location.is_some());
        assert!(OperationKind::classify("query A { a } query B { b }", None).is_err());
        assert!(OperationKind::classify("query A { a } query B { b }", Some("C")).is_err());
    }

    #[tokio::test]
    async fn test_query_and_mutation() {
        let executor = executor();
        let response = executor.execute("{ sayHello ship { name crew } }").await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            serde_json::json!({ "sayHello": "Hello", "ship": { "name": "Beagle", "crew": 74 } })
        );

        let response = executor
            .execute(r#"mutation { sendMessage(message: "ahoy") }"#)
            .await;
        assert_eq!(
            response.data.into_json().unwrap(),
            serde_json::json!({ "sendMessage": "You said ahoy" })
        );
    }

    #[tokio::test]
    async fn test_abstract_types_use_typename() {
        let response = executor()
            .execute("{ fleet { name ... on Ship { crew } } }")
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            serde_json::json!({ "fleet": [{ "name": "Endeavour", "crew": 94 }, { "name": "Dinghy" }] })
        );
    }

    #[tokio::test]
    async fn test_validation_errors_are_failures() {
        let response = executor().execute("{ doesNotExist }").await;
        assert!(is_failure(&response));
    }

    #[tokio::test]
    async fn test_subscription_stream() {
        let responses: Vec<_> = executor()
            .execute_stream("subscription { greeting }")
            .collect()
            .await;
        let greetings: Vec<_> = responses
            .into_iter()
            .map(|r| r.data.into_json().unwrap()["greeting"].clone())
            .collect();
        assert_eq!(greetings, [serde_json::json!("Hi"), serde_json::json!("Bonjour")]);
    }

    #[tokio::test]
    async fn test_missing_stream_resolver_errors() {
        let schema = validate("type Query { a: Int } type Subscription { tick: Int }")
            .into_result()
            .unwrap();
        let executor = Executor::new(&schema, &ResolverRegistry::new()).unwrap();
        let responses: Vec<_> = executor
            .execute_stream("subscription { tick }")
            .collect()
            .await;
        assert_eq!(responses.len(), 1);
        assert!(is_failure(&responses[0]));
    }
}
