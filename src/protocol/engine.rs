use std::time::Duration;

use async_graphql::Response;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use super::messages::{Event, Message, SubscribePayload, close_code};
use super::registry::{OperationHandle, OperationRegistry};
use crate::graphql::{Executor, OperationKind, is_failure};
use crate::schema::Diagnostic;

pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingInit,
    Ready,
    Closed,
}

/// A server message on its way to the socket writer.
///
/// When `delivered` is set, the writer fires it once the message has been
/// handed to the socket.
#[derive(Debug)]
pub struct Outbound {
    pub message: Message,
    pub delivered: Option<oneshot::Sender<()>>,
}

impl Outbound {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            delivered: None,
        }
    }
}

/// Why the connection loop stops.
enum Shutdown {
    Close(Message),
    WriterGone,
}

enum Outcome {
    Completed,
    Failed(Vec<Diagnostic>),
    WriterGone,
    /// The single result of a query or mutation, not yet sent.
    Responded(Response),
}

struct Finished {
    id: String,
    outcome: Outcome,
}

/// Protocol state machine for one WebSocket connection.
///
/// Runs on a single task that alone owns the registry. Every operation runs
/// on a task in a [`JoinSet`] and only reports back by finishing, so a slow
/// resolver never holds up the connection.
pub struct ProtocolEngine {
    executor: Executor,
    outbound: mpsc::Sender<Outbound>,
    init_timeout: Option<Duration>,
    state: ConnectionState,
    registry: OperationRegistry,
    /// Queries and mutations still executing; never part of `registry`.
    in_flight: OperationRegistry,
    producers: JoinSet<Finished>,
}

impl ProtocolEngine {
    pub fn new(executor: Executor, outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            executor,
            outbound,
            init_timeout: Some(DEFAULT_INIT_TIMEOUT),
            state: ConnectionState::AwaitingInit,
            registry: OperationRegistry::new(),
            in_flight: OperationRegistry::new(),
            producers: JoinSet::new(),
        }
    }

    /// `None` waits for `connection_init` forever.
    pub fn with_init_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Drives the connection until the client goes away or breaks the protocol.
    ///
    /// `frames` yields the text of each inbound data frame; its end means the
    /// transport closed. Every live operation is cancelled before returning.
    pub async fn serve<S>(mut self, mut frames: S) -> ConnectionState
    where
        S: Stream<Item = String> + Unpin,
    {
        let init_deadline = tokio::time::sleep(self.init_timeout.unwrap_or(Duration::MAX));
        tokio::pin!(init_deadline);

        loop {
            let step = tokio::select! {
                frame = frames.next() => match frame {
                    Some(text) => self.handle_frame(&text).await,
                    None => {
                        debug!("Client closed the connection");
                        break;
                    }
                },
                Some(joined) = self.producers.join_next_with_id(), if !self.producers.is_empty() => {
                    self.handle_finished(joined).await
                }
                _ = &mut init_deadline, if self.awaiting_init_with_timeout() => {
                    Err(Shutdown::Close(Message::close(
                        close_code::INIT_TIMEOUT,
                        "Connection initialisation timeout",
                    )))
                }
            };

            match step {
                Ok(()) => {}
                Err(Shutdown::Close(message)) => {
                    if let Message::Close { code, reason } = &message {
                        info!(code, reason = %reason, "Closing connection");
                    }
                    self.outbound.send(Outbound::new(message)).await.ok();
                    break;
                }
                Err(Shutdown::WriterGone) => {
                    debug!("Socket writer is gone");
                    break;
                }
            }
        }

        let cancelled = self.registry.cancel_all() + self.in_flight.cancel_all();
        if cancelled > 0 {
            debug!(cancelled, "Cancelled live operations on teardown");
        }
        self.producers.abort_all();
        self.state = ConnectionState::Closed;
        self.state
    }

    fn awaiting_init_with_timeout(&self) -> bool {
        self.state == ConnectionState::AwaitingInit && self.init_timeout.is_some()
    }

    async fn send(&self, message: Message) -> Result<(), Shutdown> {
        self.outbound
            .send(Outbound::new(message))
            .await
            .map_err(|_| Shutdown::WriterGone)
    }

    async fn handle_frame(&mut self, text: &str) -> Result<(), Shutdown> {
        let event = match Event::decode(text) {
            Ok(event) => event,
            Err(err) => {
                warn!("Error decoding websocket message: {}", err);
                return Err(Shutdown::Close(Message::close(
                    close_code::INVALID_MESSAGE,
                    format!("Invalid message received: {}", err),
                )));
            }
        };

        match (self.state, event) {
            (ConnectionState::AwaitingInit, Event::ConnectionInit { .. }) => {
                self.state = ConnectionState::Ready;
                debug!("Connection initialised");
                self.send(Message::ConnectionAck { payload: None }).await
            }
            (ConnectionState::AwaitingInit, _) => Err(Shutdown::Close(Message::close(
                close_code::UNAUTHORIZED,
                "Unauthorized",
            ))),
            (_, Event::ConnectionInit { .. }) => Err(Shutdown::Close(Message::close(
                close_code::TOO_MANY_INIT_REQUESTS,
                "Too many initialisation requests",
            ))),
            (_, Event::Subscribe { id, payload }) => self.subscribe(id, payload).await,
            (_, Event::Complete { id }) => {
                let handle = self.registry.remove(&id).or_else(|| self.in_flight.remove(&id));
                if let Some(handle) = handle {
                    debug!(id = %id, "Client completed operation");
                    handle.cancel();
                }
                Ok(())
            }
            (_, Event::Ping { .. }) => self.send(Message::Pong { payload: None }).await,
            (_, Event::Pong { .. }) => Ok(()),
        }
    }

    async fn subscribe(&mut self, id: String, payload: SubscribePayload) -> Result<(), Shutdown> {
        if self.registry.contains(&id) || self.in_flight.contains(&id) {
            return Err(Shutdown::Close(Message::close(
                close_code::SUBSCRIBER_EXISTS,
                format!("Subscriber for {} already exists", id),
            )));
        }

        let kind = match OperationKind::classify(&payload.query, payload.operation_name.as_deref()) {
            Ok(kind) => kind,
            Err(diagnostics) => {
                return self.send(Message::Error { id, payload: diagnostics }).await;
            }
        };
        let request = payload.into_request();

        if kind == OperationKind::Subscription {
            let responses = self.executor.execute_stream(request);
            let task = self
                .producers
                .spawn(produce(id.clone(), responses, self.outbound.clone()));
            debug!(id = %id, "Subscription started");
            self.registry.register(OperationHandle::new(id, task));
            return Ok(());
        }

        let executor = self.executor.clone();
        let operation_id = id.clone();
        let task = self.producers.spawn(async move {
            Finished {
                id: operation_id,
                outcome: Outcome::Responded(executor.execute(request).await),
            }
        });
        debug!(id = %id, "Operation started");
        self.in_flight.register(OperationHandle::new(id, task));
        Ok(())
    }

    async fn handle_finished(&mut self, joined: Result<(Id, Finished), JoinError>) -> Result<(), Shutdown> {
        match joined {
            Ok((task_id, Finished { id, outcome })) => {
                let removed = self
                    .registry
                    .remove_finished(&id, task_id)
                    .or_else(|| self.in_flight.remove_finished(&id, task_id));
                // cancelled by the client in the meantime
                if removed.is_none() {
                    return Ok(());
                }
                match outcome {
                    Outcome::Completed => {
                        debug!(id = %id, "Subscription completed");
                        self.send(Message::Complete { id }).await
                    }
                    Outcome::Failed(diagnostics) => {
                        debug!(id = %id, "Subscription failed");
                        self.send(Message::Error { id, payload: diagnostics }).await
                    }
                    Outcome::WriterGone => Err(Shutdown::WriterGone),
                    Outcome::Responded(response) if is_failure(&response) => {
                        let diagnostics = response.errors.iter().map(Diagnostic::from).collect();
                        self.send(Message::Error { id, payload: diagnostics }).await
                    }
                    Outcome::Responded(response) => {
                        self.send(Message::Next {
                            id: id.clone(),
                            payload: response,
                        })
                        .await?;
                        self.send(Message::Complete { id }).await
                    }
                }
            }
            Err(err) if err.is_cancelled() => Ok(()),
            Err(err) => {
                let task_id = err.id();
                let owner = self
                    .registry
                    .find_task(task_id)
                    .or_else(|| self.in_flight.find_task(task_id))
                    .map(str::to_string);
                let Some(id) = owner else {
                    error!("Producer task panicked after its operation was removed: {}", err);
                    return Ok(());
                };
                self.registry.remove_finished(&id, task_id);
                self.in_flight.remove_finished(&id, task_id);
                error!(id = %id, "Producer task panicked: {}", err);
                self.send(Message::Error {
                    id,
                    payload: vec![Diagnostic::internal("Internal error while producing payloads")],
                })
                .await
            }
        }
    }
}

/// Pulls payloads one at a time, waiting for each to reach the socket
/// before pulling the next.
async fn produce(
    id: String,
    mut responses: BoxStream<'static, Response>,
    outbound: mpsc::Sender<Outbound>,
) -> Finished {
    let outcome = loop {
        let Some(response) = responses.next().await else {
            break Outcome::Completed;
        };
        if is_failure(&response) {
            break Outcome::Failed(response.errors.iter().map(Diagnostic::from).collect());
        }

        let (delivered, ack) = oneshot::channel();
        let message = Message::Next {
            id: id.clone(),
            payload: response,
        };
        let sent = outbound
            .send(Outbound {
                message,
                delivered: Some(delivered),
            })
            .await;
        if sent.is_err() || ack.await.is_err() {
            break Outcome::WriterGone;
        }
    };
    Finished { id, outcome }
}
