//! Message definitions for the [GraphQL over WebSocket protocol][1]
//! (`graphql-transport-ws`).
//!
//! [1]: https://github.com/enisdenjo/graphql-ws/blob/master/PROTOCOL.md

use std::collections::HashMap;

use async_graphql::{Request, Response, Value, Variables};
use serde::{Deserialize, Serialize};

use crate::schema::Diagnostic;

/// The subprotocol name negotiated during the upgrade.
pub const SUBPROTOCOL: &str = "graphql-transport-ws";

/// Close codes used when the server terminates a connection.
pub mod close_code {
    /// Policy violation: an operation message arrived before `connection_init`.
    pub const UNAUTHORIZED: u16 = 1008;
    /// The frame was not valid JSON or not a known message type.
    pub const INVALID_MESSAGE: u16 = 4400;
    pub const INIT_TIMEOUT: u16 = 4408;
    pub const SUBSCRIBER_EXISTS: u16 = 4409;
    pub const TOO_MANY_INIT_REQUESTS: u16 = 4429;
}

/// A message sent by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ConnectionInit {
        payload: Option<serde_json::Value>,
    },
    Subscribe {
        id: String,
        payload: SubscribePayload,
    },
    Complete {
        id: String,
    },
    Ping {
        payload: Option<serde_json::Value>,
    },
    Pong {
        payload: Option<serde_json::Value>,
    },
}

impl Event {
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribePayload {
    pub query: String,
    #[serde(default)]
    pub variables: Option<serde_json::Value>,
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub extensions: Option<HashMap<String, serde_json::Value>>,
}

impl SubscribePayload {
    pub fn into_request(self) -> Request {
        let mut request = Request::new(self.query);
        if let Some(name) = self.operation_name {
            request = request.operation_name(name);
        }
        if let Some(variables) = self.variables {
            request = request.variables(Variables::from_json(variables));
        }
        for (key, value) in self.extensions.unwrap_or_default() {
            if let Ok(value) = Value::from_json(value) {
                request.extensions.insert(key, value);
            }
        }
        request
    }
}

/// A message sent by the server.
///
/// `Close` never goes out as a text frame; the writer turns it into a
/// WebSocket close frame.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Next {
        id: String,
        payload: Response,
    },
    Error {
        id: String,
        payload: Vec<Diagnostic>,
    },
    Complete {
        id: String,
    },
    ConnectionAck {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
    Ping {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
    Close {
        code: u16,
        reason: String,
    },
}

impl Message {
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Self::Close {
            code,
            reason: reason.into(),
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_subscribe() {
        let event = Event::decode(
            r#"{"type":"subscribe","id":"1","payload":{"query":"subscription { greeting }","operationName":null}}"#,
        )
        .unwrap();
        let Event::Subscribe { id, payload } = event else {
            panic!("expected subscribe, got {:?}", event);
        };
        assert_eq!(id, "1");
        assert_eq!(payload.query, "subscription { greeting }");
        assert!(payload.operation_name.is_none());
    }

    #[test]
    fn test_decode_payloadless_messages() {
        assert!(matches!(
            Event::decode(r#"{"type":"connection_init"}"#).unwrap(),
            Event::ConnectionInit { payload: None }
        ));
        assert!(matches!(Event::decode(r#"{"type":"ping"}"#).unwrap(), Event::Ping { .. }));
    }

    #[test]
    fn test_decode_rejects_unknown_and_malformed() {
        assert!(Event::decode(r#"{"type":"start","id":"1"}"#).is_err());
        assert!(Event::decode("not json").is_err());
        assert!(Event::decode(r#"{"type":"subscribe","id":"1"}"#).is_err());
    }

    #[test]
    fn test_encode_messages() {
        let ack = Message::ConnectionAck { payload: None }.encode().unwrap();
        assert_eq!(ack, r#"{"type":"connection_ack"}"#);

        let error = Message::Error {
            id: "7".into(),
            payload: vec![Diagnostic::internal("boom")],
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({ "type": "error", "id": "7", "payload": [{ "message": "boom" }] })
        );
    }

    #[test]
    fn test_payload_into_request_keeps_variables() {
        let payload = SubscribePayload {
            query: "query Q($n: Int) { a(n: $n) }".into(),
            variables: Some(json!({ "n": 3 })),
            operation_name: Some("Q".into()),
            extensions: None,
        };
        let request = payload.into_request();
        assert_eq!(request.operation_name.as_deref(), Some("Q"));
        assert_eq!(request.variables.get("n"), Some(&Value::from(3)));
    }
}
