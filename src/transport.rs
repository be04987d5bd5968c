//! HTTP and WebSocket front door.
//!
//! One route serves everything: `POST` runs a GraphQL request, `GET` either
//! upgrades to a `graphql-transport-ws` socket or runs a GraphQL request
//! taken from the query string.

use std::time::Duration;

use async_graphql_axum::rejection::GraphQLRejection;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::Router;
use axum::extract::ws::{self, CloseFrame, WebSocket};
use axum::extract::{FromRequest, FromRequestParts, Request, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use futures_util::future::ready;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{GqlwireError, Result};
use crate::graphql::{Executor, ResolverRegistry};
use crate::protocol::{Message, Outbound, ProtocolEngine, SUBPROTOCOL};
use crate::schema::{ValidatedSchema, validate};

/// Outbound messages buffered per connection before producers wait.
const OUTBOUND_BUFFER: usize = 16;

#[derive(Clone)]
struct AppState {
    executor: Executor,
    init_timeout: Option<Duration>,
}

/// Serves one executable schema over HTTP and WebSocket.
pub struct TransportDispatcher {
    config: ServerConfig,
    executor: Executor,
}

impl TransportDispatcher {
    pub fn new(config: ServerConfig, schema: ValidatedSchema, resolvers: ResolverRegistry) -> Result<Self> {
        let executor = Executor::new(&schema, &resolvers)?;
        Ok(Self { config, executor })
    }

    /// Validates `sdl` first; diagnostics come back as [`GqlwireError::InvalidSchema`].
    pub fn from_sdl(config: ServerConfig, sdl: &str, resolvers: ResolverRegistry) -> Result<Self> {
        let schema = validate(sdl)
            .into_result()
            .map_err(GqlwireError::InvalidSchema)?;
        Self::new(config, schema, resolvers)
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            executor: self.executor.clone(),
            init_timeout: self.config.connection_init_timeout(),
        };
        Router::new()
            .route(&self.config.path, post(graphql_post).get(graphql_get))
            .with_state(state)
    }

    /// Binds the configured address and serves until Ctrl-C.
    pub async fn serve(self) -> Result<()> {
        let address = self.config.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| GqlwireError::Server(format!("Failed to bind {}: {}", address, e)))?;
        self.serve_on(listener).await
    }

    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        info!(
            "Serving GraphQL on http://{}{} (WebSocket: ws://{}{})",
            local, self.config.path, local, self.config.path
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GqlwireError::Server(e.to_string()))
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

async fn graphql_post(State(state): State<AppState>, request: GraphQLRequest) -> GraphQLResponse {
    state.executor.execute(request.into_inner()).await.into()
}

async fn graphql_get(State(state): State<AppState>, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();

    if let Ok(upgrade) = WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        return upgrade
            .protocols([SUBPROTOCOL])
            .on_upgrade(move |socket| handle_socket(socket, state))
            .into_response();
    }

    let request = Request::from_parts(parts, body);
    match GraphQLRequest::<GraphQLRejection>::from_request(request, &state).await {
        Ok(request) => GraphQLResponse::from(state.executor.execute(request.into_inner()).await)
            .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    debug!("WebSocket connection opened");
    let (mut sink, stream) = socket.split();

    // The socket sink isn't shared, so a single writer task drains the
    // outbound channel and acknowledges each delivered payload.
    let (outbound, mut pending) = mpsc::channel::<Outbound>(OUTBOUND_BUFFER);
    let writer = tokio::spawn(async move {
        while let Some(Outbound { message, delivered }) = pending.recv().await {
            let (frame, closing) = match message {
                Message::Close { code, reason } => (
                    ws::Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })),
                    true,
                ),
                message => match message.encode() {
                    Ok(text) => (ws::Message::Text(text.into()), false),
                    Err(err) => {
                        warn!("Couldn't encode websocket message: {}", err);
                        continue;
                    }
                },
            };

            if sink.send(frame).await.is_err() {
                break;
            }
            if let Some(delivered) = delivered {
                delivered.send(()).ok();
            }
            if closing {
                break;
            }
        }
    });

    let frames = stream
        .take_while(|frame| match frame {
            Ok(ws::Message::Close(_)) => ready(false),
            Ok(_) => ready(true),
            Err(err) => {
                warn!("Error receiving websocket message: {}", err);
                ready(false)
            }
        })
        .filter_map(|frame| {
            ready(match frame {
                Ok(ws::Message::Text(text)) => Some(text.to_string()),
                Ok(ws::Message::Binary(bytes)) => Some(String::from_utf8_lossy(&bytes).into_owned()),
                _ => None,
            })
        });

    ProtocolEngine::new(state.executor, outbound)
        .with_init_timeout(state.init_timeout)
        .serve(frames)
        .await;

    writer.await.ok();
    debug!("WebSocket connection closed");
}
