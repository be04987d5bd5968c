//! Execution of operations against a validated schema.
//!
//! An [`Executor`] binds a [`ValidatedSchema`](crate::schema::ValidatedSchema)
//! to the resolvers in a [`ResolverRegistry`]. Fields without a resolver
//! read the same-named property from their parent value, so most object
//! types only need their root fields wired up.
//!
//! ```
//! use async_graphql::Value;
//! use gqlwire::graphql::{Executor, ResolverRegistry};
//! use gqlwire::schema::validate;
//!
//! # tokio_test_block(async {
//! let schema = validate("type Query { sayHello: String! }").into_result().unwrap();
//! let resolvers = ResolverRegistry::new()
//!     .field("Query", "sayHello", |_| async { Ok(Value::from("Hello")) });
//! let executor = Executor::new(&schema, &resolvers).unwrap();
//! let response = executor.execute("{ sayHello }").await;
//! assert!(response.errors.is_empty());
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

mod executor;
mod resolvers;

pub use executor::{Executor, OperationKind, is_failure};
pub use resolvers::{FieldResolver, PayloadStream, ResolverArgs, ResolverRegistry, StreamResolver};
