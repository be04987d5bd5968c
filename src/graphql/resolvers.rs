use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_graphql::{Error, Value};
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, Stream, StreamExt};
use indexmap::IndexMap;

/// What a resolver gets to work with.
#[derive(Debug, Clone, Default)]
pub struct ResolverArgs {
    /// Value produced for the parent field, `Null` on root types.
    pub parent: Value,
    pub args: IndexMap<String, Value>,
}

impl ResolverArgs {
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    pub fn string_arg(&self, name: &str) -> async_graphql::Result<&str> {
        match self.args.get(name) {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => Err(Error::new(format!(
                "Argument \"{}\" must be a string, got {}",
                name, other
            ))),
            None => Err(Error::new(format!("Missing argument \"{}\"", name))),
        }
    }
}

pub type FieldResolver =
    Arc<dyn Fn(ResolverArgs) -> BoxFuture<'static, async_graphql::Result<Value>> + Send + Sync>;

/// Lazy payload sequence of one subscription. Each poll produces at most
/// one payload; dropping the stream cancels it and releases what it holds.
pub type PayloadStream = BoxStream<'static, async_graphql::Result<Value>>;

pub type StreamResolver = Arc<dyn Fn(ResolverArgs) -> PayloadStream + Send + Sync>;

type FieldKey = (String, String);

/// Resolvers keyed by `(type name, field name)`.
///
/// Fields without a registered resolver fall back to reading the property
/// of the same name from the parent value.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    fields: HashMap<FieldKey, FieldResolver>,
    streams: HashMap<FieldKey, StreamResolver>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an async resolver for a query, mutation or object field.
    pub fn field<F, Fut>(mut self, type_name: &str, field_name: &str, resolver: F) -> Self
    where
        F: Fn(ResolverArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = async_graphql::Result<Value>> + Send + 'static,
    {
        let resolver: FieldResolver = Arc::new(move |args| resolver(args).boxed());
        self.fields
            .insert((type_name.to_string(), field_name.to_string()), resolver);
        self
    }

    /// Registers the payload producer of a subscription field.
    pub fn stream<F, S>(mut self, type_name: &str, field_name: &str, producer: F) -> Self
    where
        F: Fn(ResolverArgs) -> S + Send + Sync + 'static,
        S: Stream<Item = async_graphql::Result<Value>> + Send + 'static,
    {
        let producer: StreamResolver = Arc::new(move |args| producer(args).boxed());
        self.streams
            .insert((type_name.to_string(), field_name.to_string()), producer);
        self
    }

    pub fn field_resolver(&self, type_name: &str, field_name: &str) -> Option<&FieldResolver> {
        self.fields
            .get(&(type_name.to_string(), field_name.to_string()))
    }

    pub fn stream_resolver(&self, type_name: &str, field_name: &str) -> Option<&StreamResolver> {
        self.streams
            .get(&(type_name.to_string(), field_name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.fields.len() + self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("streams", &self.streams.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The property of `parent` named like the field, or null.
pub(crate) fn default_resolve(parent: &Value, field_name: &str) -> Value {
    match parent {
        Value::Object(map) => map.get(field_name).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
