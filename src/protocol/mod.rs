//! The `graphql-transport-ws` subscription protocol.
//!
//! One [`ProtocolEngine`] runs per connection. It consumes decoded text
//! frames, writes [`Outbound`] messages to a channel drained by the socket
//! writer, and keeps the connection's live operations in an
//! [`OperationRegistry`]. The engine is transport agnostic; see
//! [`crate::transport`] for the axum wiring.

mod engine;
mod messages;
mod registry;

pub use engine::{ConnectionState, DEFAULT_INIT_TIMEOUT, Outbound, ProtocolEngine};
pub use messages::{Event, Message, SUBPROTOCOL, SubscribePayload, close_code};
pub use registry::{OperationHandle, OperationRegistry};
