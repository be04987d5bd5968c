//! # gqlwire - GraphQL SDL validation and a subscription-capable server
//!
//! gqlwire checks GraphQL schema definitions with located diagnostics and
//! serves a validated schema over HTTP and the `graphql-transport-ws`
//! WebSocket protocol.
//!
//! ## Quick Start
//!
//! ```bash
//! # Report every problem in an SDL file
//! gqlwire check schema.graphql
//!
//! # List object types and their fields
//! gqlwire types schema.graphql --json
//!
//! # Serve the built-in greeting schema on 0.0.0.0:8080/graphql
//! gqlwire serve
//! ```
//!
//! ## Modules
//!
//! - [`schema`]: SDL validation pipeline and type introspection
//! - [`graphql`]: Executable schema and resolver registry
//! - [`protocol`]: Per-connection `graphql-transport-ws` engine
//! - [`transport`]: axum router for HTTP and WebSocket
//! - [`config`]: Configuration loading
//! - [`cli`]: Command-line interface definitions

/// Command-line interface definitions using clap.
pub mod cli;

/// Configuration loading and management.
///
/// Handles `gqlwire.toml` / `gqlwire.yml` files and their discovery.
pub mod config;

/// The built-in greeting schema and its resolvers.
pub mod demo;

/// Error types and result aliases.
///
/// Defines `GqlwireError` enum and `Result<T>` type alias.
pub mod error;

pub mod graphql;
pub mod logging;
pub mod protocol;
pub mod schema;

/// HTTP and WebSocket serving with axum.
pub mod transport;
