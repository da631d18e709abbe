//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and drives each connection through its
//! registration lifecycle:
//!
//! ```text
//! Unregistered --(first valid message)--> Registered
//! Registered   --(close | error)--------> Removed
//! Unregistered --(close | error)--------> Removed
//! ```
//!
//! A registered connection whose socket has gone away is also pruned by the
//! next broadcast.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinError;

use super::hub::HubHandle;
use super::messages::parse_client_message;
use super::registry::ConnectionId;
use super::transport::{ChannelTransport, Transport};
use crate::api::AppState;

/// Registry membership of a single connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unregistered,
    Registered,
    Removed,
}

/// Per-connection lifecycle state machine
pub struct Session {
    id: ConnectionId,
    remote_addr: Option<SocketAddr>,
    state: SessionState,
    transport: Arc<dyn Transport>,
    hub: HubHandle,
}

impl Session {
    /// A connection was accepted. It is not registered until it sends a
    /// message that parses.
    pub fn accept(
        hub: HubHandle,
        transport: Arc<dyn Transport>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        let id = ConnectionId::new();
        tracing::info!(
            connection_id = %id,
            remote_addr = %display_addr(remote_addr),
            "WebSocket connection"
        );

        Self {
            id,
            remote_addr,
            state: SessionState::Unregistered,
            transport,
            hub,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Handle an inbound text payload
    pub fn on_message(&mut self, text: &str) {
        tracing::debug!(connection_id = %self.id, text = %text, "WebSocket received");

        match self.state {
            SessionState::Removed => {}
            SessionState::Registered => {
                if let Err(e) = parse_client_message(text) {
                    tracing::debug!(connection_id = %self.id, error = %e, "Invalid client message");
                }
            }
            SessionState::Unregistered => match parse_client_message(text) {
                Ok(_) => match self.hub.register(self.id, &self.transport) {
                    Ok(()) => self.state = SessionState::Registered,
                    Err(e) => {
                        tracing::error!(connection_id = %self.id, error = %e, "Failed to register connection");
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        connection_id = %self.id,
                        remote_addr = %display_addr(self.remote_addr),
                        error = %e,
                        "Invalid client message, connection not registered"
                    );
                }
            },
        }
    }

    /// The transport reported a close
    pub fn on_close(&mut self) {
        if self.remove() {
            tracing::info!(
                connection_id = %self.id,
                remote_addr = %display_addr(self.remote_addr),
                "WebSocket closed"
            );
        }
    }

    /// The transport reported an error. The connection is finished either way.
    pub fn on_error(&mut self, error: &dyn Display) {
        if self.remove() {
            tracing::warn!(
                connection_id = %self.id,
                remote_addr = %display_addr(self.remote_addr),
                error = %error,
                "WebSocket error"
            );
        }
    }

    /// Returns false if the session was already removed
    fn remove(&mut self) -> bool {
        if self.state == SessionState::Removed {
            return false;
        }
        if self.state == SessionState::Registered {
            // Hub already gone means the registry is gone with it
            let _ = self.hub.unregister(self.id);
        }
        self.state = SessionState::Removed;
        true
    }
}

fn display_addr(addr: Option<SocketAddr>) -> String {
    addr.map(|a| a.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = state.hub.clone();
    let remote_addr = connect_info.map(|ConnectInfo(addr)| addr);
    ws.on_upgrade(move |socket| handle_socket(socket, hub, remote_addr))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: HubHandle, remote_addr: Option<SocketAddr>) {
    let (mut sender, mut receiver) = socket.split();

    let (transport, mut outbound) = ChannelTransport::new();
    let mut session = Session::accept(hub, Arc::new(transport), remote_addr);
    let connection_id = session.id();

    // Forward broadcast messages from the channel to the socket. Dropping
    // the receiver when this task ends marks the transport closed.
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            sender.send(Message::Text(text.to_string())).await?;
        }
        Ok::<(), axum::Error>(())
    });

    let ending = {
        let recv_loop = async {
            while let Some(result) = receiver.next().await {
                match result {
                    Ok(Message::Close(_)) => break,
                    Ok(message) => handle_frame(&mut session, message),
                    Err(e) => return Ending::Failed(e.to_string()),
                }
            }
            Ending::Closed
        };

        tokio::select! {
            ending = recv_loop => ending,
            joined = &mut send_task => {
                let ending = Ending::from_writer(joined);
                if let Ending::Failed(e) = &ending {
                    tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                }
                ending
            }
        }
    };

    send_task.abort();
    ending.apply(&mut session);
}

/// How a connection's socket loops finished
#[derive(Debug, PartialEq, Eq)]
enum Ending {
    Closed,
    Failed(String),
}

impl Ending {
    /// Map the writer task's result. An aborted writer is a plain close.
    fn from_writer<E: Display>(joined: Result<Result<(), E>, JoinError>) -> Self {
        match joined {
            Ok(Ok(())) => Ending::Closed,
            Ok(Err(e)) => Ending::Failed(e.to_string()),
            Err(e) if e.is_cancelled() => Ending::Closed,
            Err(e) => Ending::Failed(e.to_string()),
        }
    }

    fn apply(self, session: &mut Session) {
        match self {
            Ending::Closed => session.on_close(),
            Ending::Failed(e) => session.on_error(&e),
        }
    }
}

fn handle_frame(session: &mut Session, message: Message) {
    match message {
        Message::Text(text) => session.on_message(&text),
        Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
            Ok(text) => session.on_message(text),
            Err(e) => {
                tracing::warn!(connection_id = %session.id(), error = %e, "Non UTF-8 binary message");
            }
        },
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => {}
        Message::Close(_) => session.on_close(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::hub::{Hub, HubConfig};
    use crate::websocket::transport::testing::RecordingTransport;
    use serde_json::json;

    fn session_for(hub: &HubHandle, transport: &Arc<RecordingTransport>) -> Session {
        let transport: Arc<dyn Transport> = transport.clone();
        Session::accept(hub.clone(), transport, Some(([127, 0, 0, 1], 40000).into()))
    }

    #[tokio::test]
    async fn test_accept_does_not_register() {
        let (hub, _task) = Hub::spawn(HubConfig::default());
        let t = RecordingTransport::open();
        let session = session_for(&hub, &t);

        assert_eq!(session.state(), SessionState::Unregistered);
        assert_eq!(session.remote_addr().unwrap().port(), 40000);
        assert_eq!(hub.connection_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_then_valid_message() {
        let (hub, _task) = Hub::spawn(HubConfig::default());
        let d = RecordingTransport::open();
        let mut session = session_for(&hub, &d);

        session.on_message("{not json");
        assert_eq!(session.state(), SessionState::Unregistered);
        assert!(!hub.is_registered(session.id()).await.unwrap());

        session.on_message(r#"{"equipment": "seat-3"}"#);
        assert_eq!(session.state(), SessionState::Registered);
        assert!(hub.is_registered(session.id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_repeated_messages_register_once() {
        let (hub, _task) = Hub::spawn(HubConfig::default());
        let t = RecordingTransport::open();
        let mut session = session_for(&hub, &t);

        session.on_message("{}");
        session.on_message("{}");
        session.on_message("oops");
        assert_eq!(session.state(), SessionState::Registered);
        assert_eq!(hub.connection_count().await.unwrap(), 1);

        hub.broadcast(&json!(7)).await.unwrap();
        assert_eq!(t.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_close_removes_registration() {
        let (hub, _task) = Hub::spawn(HubConfig::default());
        let t = RecordingTransport::open();
        let mut session = session_for(&hub, &t);
        session.on_message("[]");

        session.on_close();
        assert_eq!(session.state(), SessionState::Removed);
        assert_eq!(hub.connection_count().await.unwrap(), 0);

        // Terminal: later events change nothing
        session.on_message("{}");
        session.on_close();
        assert_eq!(session.state(), SessionState::Removed);
        assert_eq!(hub.connection_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_error_after_registration() {
        let (hub, _task) = Hub::spawn(HubConfig::default());
        let e = RecordingTransport::open();
        let other = RecordingTransport::open();
        let mut session = session_for(&hub, &e);
        let mut healthy = session_for(&hub, &other);
        session.on_message("{}");
        healthy.on_message("{}");

        e.close();
        session.on_error(&"connection reset by peer");
        assert_eq!(session.state(), SessionState::Removed);

        let report = hub.broadcast(&json!({"temp": 20})).await.unwrap();
        assert_eq!((report.sent, report.pruned), (1, 0));
        assert!(e.sent().is_empty());
        assert_eq!(other.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_writer_send_failure_is_an_error() {
        let (hub, _task) = Hub::spawn(HubConfig::default());
        let t = RecordingTransport::open();
        let mut session = session_for(&hub, &t);
        session.on_message("{}");

        let ending = Ending::from_writer::<&str>(Ok(Err("broken pipe")));
        assert_eq!(ending, Ending::Failed("broken pipe".to_string()));

        ending.apply(&mut session);
        assert_eq!(session.state(), SessionState::Removed);
        assert_eq!(hub.connection_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_writer_drained_or_aborted_is_a_close() {
        assert_eq!(Ending::from_writer::<&str>(Ok(Ok(()))), Ending::Closed);

        let aborted = tokio::spawn(std::future::pending::<Result<(), &str>>());
        aborted.abort();
        assert_eq!(Ending::from_writer(aborted.await), Ending::Closed);

        let panicked = tokio::spawn(async {
            if true {
                panic!("writer crashed");
            }
            Ok::<(), &str>(())
        });
        assert!(matches!(Ending::from_writer(panicked.await), Ending::Failed(_)));
    }

    #[tokio::test]
    async fn test_unregistered_close_is_noop() {
        let (hub, _task) = Hub::spawn(HubConfig::default());
        let t = RecordingTransport::open();
        let keep = RecordingTransport::open();
        let mut registered = session_for(&hub, &keep);
        registered.on_message("{}");

        let mut session = session_for(&hub, &t);
        session.on_error(&"handshake aborted");
        assert_eq!(session.state(), SessionState::Removed);
        assert_eq!(hub.connection_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_binary_frames() {
        let (hub, _task) = Hub::spawn(HubConfig::default());
        let t = RecordingTransport::open();
        let mut session = session_for(&hub, &t);

        handle_frame(&mut session, Message::Binary(vec![0xff, 0xfe]));
        assert_eq!(session.state(), SessionState::Unregistered);

        handle_frame(&mut session, Message::Ping(vec![1]));
        assert_eq!(session.state(), SessionState::Unregistered);

        handle_frame(&mut session, Message::Binary(br#"{"ok":1}"#.to_vec()));
        assert_eq!(session.state(), SessionState::Registered);

        handle_frame(&mut session, Message::Close(None));
        assert_eq!(session.state(), SessionState::Removed);
        assert_eq!(hub.connection_count().await.unwrap(), 0);
    }
}
